// In crates/api-client/src/lib.rs

use app_config::types::ExchangeSettings;
use chrono::Utc;
use core_types::Side;
use hmac::{Hmac, Mac};
use reqwest::{Method, Response, StatusCode};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

pub mod error;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use types::*;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

impl ApiClient {
    /// Constructs a new ApiClient from the exchange settings.
    pub fn new(settings: &ExchangeSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;

        Ok(ApiClient {
            http_client,
            api_key: settings.api_key.clone(),
            secret_key: settings.secret_key.clone(),
            base_url: settings.rest_base_url.trim_end_matches('/').to_string(),
            recv_window_ms: settings.recv_window_ms,
        })
    }

    /// Generates an HMAC-SHA256 signature for a given query string.
    ///
    /// # Arguments
    ///
    /// * `query_string`: The URL-encoded query string to be signed.
    ///
    /// # Returns
    ///
    /// A hexadecimal string representation of the signature.
    fn sign(&self, query_string: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| Error::SigningFailed(e.to_string()))?;
        mac.update(query_string.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Appends `recvWindow`, `timestamp` and the signature to `params`.
    fn create_signed_query(&self, params: &mut String) -> Result<()> {
        let timestamp = Utc::now().timestamp_millis();

        if !params.is_empty() {
            params.push('&');
        }
        params.push_str(&format!(
            "recvWindow={}&timestamp={}",
            self.recv_window_ms, timestamp
        ));

        let signature = self.sign(params)?;
        params.push_str(&format!("&signature={}", signature));
        Ok(())
    }

    async fn signed_request(&self, method: Method, path: &str, mut params: String) -> Result<Value> {
        self.create_signed_query(&mut params)?;
        let url = format!("{}{}?{}", self.base_url, path, params);

        let response = self
            .http_client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        read_json(response).await
    }

    /// Fetches the most recent klines (candlesticks) for a symbol.
    ///
    /// This corresponds to the `GET /api/v3/klines` endpoint. The last entry
    /// is usually the still-open candle.
    ///
    /// # Arguments
    ///
    /// * `symbol`: The symbol to fetch klines for.
    /// * `interval`: The kline interval (e.g., "1m", "5m", "1h").
    /// * `limit`: Number of klines to return (max 1000).
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u16) -> Result<Vec<Kline>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let response = self.http_client.get(&url).send().await?;
        let value = read_json(response).await?;
        let raw_klines: Vec<RawKline> = serde_json::from_value(value)?;

        // Convert the RawKlines into our clean, internal Kline type.
        raw_klines
            .into_iter()
            .map(|raw| {
                Ok(Kline {
                    open_time: raw.0,
                    open: parse_decimal("open", &raw.1)?,
                    high: parse_decimal("high", &raw.2)?,
                    low: parse_decimal("low", &raw.3)?,
                    close: parse_decimal("close", &raw.4)?,
                    volume: parse_decimal("volume", &raw.5)?,
                    close_time: raw.6,
                })
            })
            .collect()
    }

    /// Fetches the spot account balances.
    ///
    /// This corresponds to the `GET /api/v3/account` endpoint.
    pub async fn get_account(&self) -> Result<AccountInfo> {
        let value = self
            .signed_request(Method::GET, "/api/v3/account", String::new())
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Places a new market order tagged with our own client order id.
    /// Corresponds to `POST /api/v3/order`.
    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        client_order_id: &str,
    ) -> Result<OrderResponse> {
        let side_str = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let params = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}",
            symbol,
            side_str,
            quantity.normalize(),
            client_order_id
        );

        let value = self
            .signed_request(Method::POST, "/api/v3/order", params)
            .await?;
        // The order was accepted; an ack we cannot read still leaves it live.
        let order: OrderResponse = serde_json::from_value(value).map_err(Error::UnreadableAck)?;

        tracing::debug!(order_id = order.order_id, status = %order.status, "Order accepted by exchange.");
        Ok(order)
    }

    /// Looks a single order up by its exchange id.
    /// Corresponds to `GET /api/v3/order`.
    pub async fn get_order(&self, symbol: &str, order_id: i64) -> Result<OrderResponse> {
        let params = format!("symbol={}&orderId={}", symbol, order_id);
        let value = self
            .signed_request(Method::GET, "/api/v3/order", params)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Lists orders for a symbol created within `[start_ms, end_ms]`.
    /// Corresponds to `GET /api/v3/allOrders`.
    pub async fn get_all_orders(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<OrderResponse>> {
        let params = format!(
            "symbol={}&startTime={}&endTime={}",
            symbol, start_ms, end_ms
        );
        let value = self
            .signed_request(Method::GET, "/api/v3/allOrders", params)
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal> {
    raw.parse().map_err(|_| Error::InvalidField {
        field,
        value: raw.to_string(),
    })
}

/// Reads a response body, turning Binance error payloads and throttling into errors.
async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return Err(Error::RateLimited {
            status: status.as_u16(),
        });
    }

    let text = response.text().await?;
    // A 5xx may still carry a Binance error object; the status decides.
    if status.is_server_error() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            body: text,
        });
    }
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        Err(e) => return Err(Error::DeserializationFailed(e)),
    };

    // Binance returns an error object on failure, so we check for that first.
    if let Some(code) = value.get("code").and_then(Value::as_i64) {
        if value.get("msg").is_some() && code != 0 {
            let msg = value
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return Err(Error::ApiError { code, msg });
        }
    }

    if !status.is_success() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(value)
}
