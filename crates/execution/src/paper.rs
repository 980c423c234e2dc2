// In crates/execution/src/paper.rs

use crate::{AccountGateway, GatewayError, MarketDataSource, Result};
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    Balance, ExchangeOrder, ExchangeOrderStatus, OrderIntent, OrderQuery, Side, Symbol,
    TradingPair,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Binance's error code for an order the account cannot cover.
const INSUFFICIENT_BALANCE: i64 = -2010;
const INVALID_SYMBOL: i64 = -1121;

/// The state of the simulated account.
#[derive(Debug, Default)]
struct PaperAccount {
    /// Free balance per asset.
    balances: HashMap<String, Decimal>,
    /// Every order ever filled, oldest first.
    orders: Vec<ExchangeOrder>,
    next_order_id: u64,
}

/// A dry-run account gateway.
///
/// Market orders fill instantly at the latest price of the wrapped market
/// data source; the fee is taken from the asset received. Filled orders are
/// kept so reconciliation can look them up like real exchange history.
pub struct PaperGateway {
    market: Arc<dyn MarketDataSource>,
    pairs: HashMap<Symbol, TradingPair>,
    fee_rate: Decimal,
    account: Mutex<PaperAccount>,
}

impl PaperGateway {
    /// Creates a paper account holding `balances`.
    ///
    /// # Arguments
    ///
    /// * `market`: Where fill prices come from.
    /// * `pairs`: The pairs orders may be placed on.
    /// * `balances`: Starting free balance per asset.
    /// * `fee_rate`: Taker fee as a fraction (e.g., 0.001 for 0.1%).
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        pairs: &[TradingPair],
        balances: HashMap<String, Decimal>,
        fee_rate: Decimal,
    ) -> Self {
        Self {
            market,
            pairs: pairs
                .iter()
                .map(|p| (p.symbol.clone(), p.clone()))
                .collect(),
            fee_rate,
            account: Mutex::new(PaperAccount {
                balances,
                ..PaperAccount::default()
            }),
        }
    }

    fn rejected(code: i64, msg: String) -> GatewayError {
        GatewayError::Rejected { code, msg }
    }
}

impl PaperAccount {
    fn free(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Moves `spend` of one asset into `receive` of another, or refuses.
    fn settle(&mut self, spend_asset: &str, spend: Decimal, receive_asset: &str, receive: Decimal) -> Result<()> {
        let free = self.free(spend_asset);
        if free < spend {
            return Err(PaperGateway::rejected(
                INSUFFICIENT_BALANCE,
                format!("Account has insufficient balance: {free} {spend_asset} < {spend}"),
            ));
        }
        *self.balances.entry(spend_asset.to_string()).or_default() -= spend;
        *self.balances.entry(receive_asset.to_string()).or_default() += receive;
        Ok(())
    }
}

#[async_trait]
impl AccountGateway for PaperGateway {
    fn name(&self) -> &'static str {
        "PaperGateway"
    }

    async fn get_balance(&self, asset: &str) -> Result<Balance> {
        let account = self.account.lock().await;
        Ok(Balance {
            asset: asset.to_string(),
            available: account.free(asset),
            locked: Decimal::ZERO,
        })
    }

    async fn submit_order(&self, intent: &OrderIntent) -> Result<String> {
        let pair = self.pairs.get(&intent.pair).ok_or_else(|| {
            Self::rejected(INVALID_SYMBOL, format!("Invalid symbol: {}", intent.pair))
        })?;

        // --- 1. Price the fill from the latest market point ---
        let window = self.market.get_recent_prices(pair, 1).await?;
        let price = window.latest_price();
        let notional = intent.quantity * price;
        let keep = Decimal::ONE - self.fee_rate;

        // --- 2. Move balances ---
        let mut account = self.account.lock().await;
        match intent.side {
            Side::Buy => account.settle(&pair.quote_asset, notional, &pair.base_asset, intent.quantity * keep)?,
            Side::Sell => account.settle(&pair.base_asset, intent.quantity, &pair.quote_asset, notional * keep)?,
        }

        // --- 3. Record the fill ---
        account.next_order_id += 1;
        let exchange_order_id = account.next_order_id.to_string();
        account.orders.push(ExchangeOrder {
            exchange_order_id: exchange_order_id.clone(),
            client_order_id: Some(intent.decision_id.0.clone()),
            pair: intent.pair.clone(),
            side: intent.side,
            quantity: intent.quantity,
            status: ExchangeOrderStatus::Filled,
            created_at: Utc::now(),
        });

        tracing::info!(
            decision_id = %intent.decision_id,
            exchange_order_id = %exchange_order_id,
            %price,
            quantity = %intent.quantity,
            "Paper order filled."
        );
        Ok(exchange_order_id)
    }

    async fn get_order_status(&self, query: &OrderQuery) -> Result<Vec<ExchangeOrder>> {
        let account = self.account.lock().await;
        let matches = account
            .orders
            .iter()
            .filter(|o| match query {
                OrderQuery::ByExchangeId {
                    pair,
                    exchange_order_id,
                } => &o.pair == pair && &o.exchange_order_id == exchange_order_id,
                OrderQuery::ByWindow { pair, from, to } => {
                    &o.pair == pair && o.created_at >= *from && o.created_at <= *to
                }
            })
            .cloned()
            .collect();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_types::{DecisionId, PricePoint, PriceWindow};
    use rust_decimal_macros::dec;

    struct FixedPrice(Decimal);

    #[async_trait]
    impl MarketDataSource for FixedPrice {
        fn name(&self) -> &'static str {
            "FixedPrice"
        }

        async fn get_recent_prices(&self, _pair: &TradingPair, count: usize) -> Result<PriceWindow> {
            let point = PricePoint::new(Utc::now(), self.0);
            Ok(PriceWindow::new(vec![point], count)?)
        }
    }

    fn gateway(quote: Decimal, fee_rate: Decimal) -> PaperGateway {
        let pair = TradingPair::new("BTCUSDT", "BTC", "USDT");
        let balances = HashMap::from([("USDT".to_string(), quote)]);
        PaperGateway::new(Arc::new(FixedPrice(dec!(100))), &[pair], balances, fee_rate)
    }

    fn intent(side: Side, quantity: Decimal) -> OrderIntent {
        let symbol = Symbol("BTCUSDT".to_string());
        OrderIntent {
            decision_id: DecisionId::for_decision(&symbol, Utc::now(), side),
            pair: symbol,
            side,
            quantity,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_buy_then_sell_moves_balances() {
        let gw = gateway(dec!(1000), Decimal::ZERO);

        gw.submit_order(&intent(Side::Buy, dec!(4))).await.unwrap();
        assert_eq!(gw.get_balance("USDT").await.unwrap().available, dec!(600));
        assert_eq!(gw.get_balance("BTC").await.unwrap().available, dec!(4));

        gw.submit_order(&intent(Side::Sell, dec!(4))).await.unwrap();
        assert_eq!(gw.get_balance("USDT").await.unwrap().available, dec!(1000));
        assert_eq!(gw.get_balance("BTC").await.unwrap().available, dec!(0));
    }

    #[tokio::test]
    async fn test_fee_taken_from_received_asset() {
        let gw = gateway(dec!(1000), dec!(0.001));
        gw.submit_order(&intent(Side::Buy, dec!(2))).await.unwrap();

        assert_eq!(gw.get_balance("BTC").await.unwrap().available, dec!(1.998));
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_rejected() {
        let gw = gateway(dec!(50), Decimal::ZERO);
        let result = gw.submit_order(&intent(Side::Buy, dec!(1))).await;

        assert!(matches!(result, Err(GatewayError::Rejected { code: INSUFFICIENT_BALANCE, .. })));
        assert_eq!(gw.get_balance("USDT").await.unwrap().available, dec!(50));
    }

    #[tokio::test]
    async fn test_history_is_queryable() {
        let gw = gateway(dec!(1000), Decimal::ZERO);
        let buy = intent(Side::Buy, dec!(1));
        let id = gw.submit_order(&buy).await.unwrap();

        let by_id = gw
            .get_order_status(&OrderQuery::ByExchangeId {
                pair: buy.pair.clone(),
                exchange_order_id: id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].client_order_id.as_deref(), Some(buy.decision_id.as_str()));

        let now = Utc::now();
        let window = gw
            .get_order_status(&OrderQuery::ByWindow {
                pair: buy.pair.clone(),
                from: now - Duration::minutes(1),
                to: now + Duration::minutes(1),
            })
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].exchange_order_id, id);
    }

    #[tokio::test]
    async fn test_unknown_symbol_rejected() {
        let gw = gateway(dec!(1000), Decimal::ZERO);
        let mut order = intent(Side::Buy, dec!(1));
        order.pair = Symbol("DOGEUSDT".to_string());

        let result = gw.submit_order(&order).await;
        assert!(matches!(result, Err(GatewayError::Rejected { code: INVALID_SYMBOL, .. })));
    }
}
