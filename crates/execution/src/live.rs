// In crates/execution/src/live.rs

use crate::{AccountGateway, GatewayError, MarketDataSource, Result};
use api_client::{ApiClient, OrderResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    Balance, ExchangeOrder, ExchangeOrderStatus, OrderIntent, OrderQuery, PricePoint, PriceWindow,
    Side, Symbol, TradingPair,
};

/// Binance's upper bound for `limit` on the klines endpoint.
const MAX_KLINES: usize = 1000;

/// A gateway that reads prices from and places real orders on Binance spot.
///
/// This gateway interacts directly with the `ApiClient` to send signed
/// requests for balances, market orders and order history.
#[derive(Debug, Clone)]
pub struct BinanceGateway {
    /// The API client for communicating with Binance.
    api_client: ApiClient,
    /// Candle interval the price window is built from.
    candle_interval: String,
}

impl BinanceGateway {
    /// Creates a new `BinanceGateway`.
    ///
    /// # Arguments
    ///
    /// * `api_client`: The Binance API client
    /// * `candle_interval`: Kline interval such as "1m"
    pub fn new(api_client: ApiClient, candle_interval: impl Into<String>) -> Self {
        Self {
            api_client,
            candle_interval: candle_interval.into(),
        }
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("timestamp out of range: {ms}")))
}

fn exchange_status(raw: &str) -> Result<ExchangeOrderStatus> {
    match raw {
        "NEW" | "PENDING_NEW" => Ok(ExchangeOrderStatus::New),
        "PARTIALLY_FILLED" => Ok(ExchangeOrderStatus::PartiallyFilled),
        "FILLED" => Ok(ExchangeOrderStatus::Filled),
        "CANCELED" | "PENDING_CANCEL" => Ok(ExchangeOrderStatus::Canceled),
        "REJECTED" => Ok(ExchangeOrderStatus::Rejected),
        "EXPIRED" | "EXPIRED_IN_MATCH" => Ok(ExchangeOrderStatus::Expired),
        other => Err(GatewayError::InvalidResponse(format!(
            "unknown order status: {other}"
        ))),
    }
}

fn to_exchange_order(order: OrderResponse) -> Result<ExchangeOrder> {
    let side = match order.side.as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        other => {
            return Err(GatewayError::InvalidResponse(format!(
                "unknown order side: {other}"
            )));
        }
    };
    Ok(ExchangeOrder {
        exchange_order_id: order.order_id.to_string(),
        client_order_id: Some(order.client_order_id),
        pair: Symbol(order.symbol),
        side,
        quantity: order.orig_qty,
        status: exchange_status(&order.status)?,
        created_at: from_millis(order.time)?,
    })
}

#[async_trait]
impl MarketDataSource for BinanceGateway {
    fn name(&self) -> &'static str {
        "BinanceGateway"
    }

    async fn get_recent_prices(&self, pair: &TradingPair, count: usize) -> Result<PriceWindow> {
        // One extra row because the newest kline is usually still open.
        let limit = (count + 1).min(MAX_KLINES) as u16;
        let klines = self
            .api_client
            .get_klines(&pair.symbol.0, &self.candle_interval, limit)
            .await?;

        let now_ms = Utc::now().timestamp_millis();
        let points = klines
            .into_iter()
            .filter(|k| k.close_time < now_ms)
            .map(|k| Ok(PricePoint::new(from_millis(k.close_time)?, k.close)))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(pair = %pair.symbol, points = points.len(), "Fetched closed klines.");
        Ok(PriceWindow::new(points, count)?)
    }
}

#[async_trait]
impl AccountGateway for BinanceGateway {
    fn name(&self) -> &'static str {
        "BinanceGateway"
    }

    async fn get_balance(&self, asset: &str) -> Result<Balance> {
        let account = self.api_client.get_account().await?;
        let balance = account
            .balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| Balance {
                asset: b.asset,
                available: b.free,
                locked: b.locked,
            })
            .unwrap_or_else(|| Balance::empty(asset));
        Ok(balance)
    }

    async fn submit_order(&self, intent: &OrderIntent) -> Result<String> {
        tracing::info!(
            decision_id = %intent.decision_id,
            pair = %intent.pair,
            side = %intent.side,
            quantity = %intent.quantity,
            "Placing live market order..."
        );

        let response = self
            .api_client
            .place_market_order(
                &intent.pair.0,
                intent.side,
                intent.quantity,
                intent.decision_id.as_str(),
            )
            .await?;

        Ok(response.order_id.to_string())
    }

    async fn get_order_status(&self, query: &OrderQuery) -> Result<Vec<ExchangeOrder>> {
        let orders = match query {
            OrderQuery::ByExchangeId {
                pair,
                exchange_order_id,
            } => {
                let order_id: i64 = exchange_order_id.parse().map_err(|_| {
                    GatewayError::InvalidResponse(format!(
                        "not a Binance order id: {exchange_order_id}"
                    ))
                })?;
                vec![self.api_client.get_order(&pair.0, order_id).await?]
            }
            OrderQuery::ByWindow { pair, from, to } => {
                self.api_client
                    .get_all_orders(&pair.0, from.timestamp_millis(), to.timestamp_millis())
                    .await?
            }
        };

        orders.into_iter().map(to_exchange_order).collect()
    }
}
