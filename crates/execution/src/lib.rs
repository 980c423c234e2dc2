// In crates/execution/src/lib.rs

use async_trait::async_trait;
use core_types::{Balance, ExchangeOrder, OrderIntent, OrderQuery, PriceWindow, TradingPair};

pub mod error;
pub mod live;
pub mod paper;

// Re-export public types
pub use error::{GatewayError, Result};
pub use live::BinanceGateway;
pub use paper::PaperGateway;

/// Read-only market data for a trading pair.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// The name of the source (e.g., "BinanceGateway").
    fn name(&self) -> &'static str;

    /// Returns the most recent `count` closed price points, oldest first.
    ///
    /// # Arguments
    ///
    /// * `pair`: The pair to fetch prices for.
    /// * `count`: How many points the window should hold at most.
    async fn get_recent_prices(&self, pair: &TradingPair, count: usize) -> Result<PriceWindow>;
}

/// Balances and order placement against the exchange account.
///
/// Implementations must not retry `submit_order` on their own: a retried
/// submission after an indeterminate failure can place a duplicate order.
#[async_trait]
pub trait AccountGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Free and locked amounts of one asset. An asset the account has never
    /// held is reported as an empty balance.
    async fn get_balance(&self, asset: &str) -> Result<Balance>;

    /// Places a market order for the intent and returns the exchange order id.
    ///
    /// The decision id travels with the order as its client order id.
    async fn submit_order(&self, intent: &OrderIntent) -> Result<String>;

    /// Looks orders up for reconciliation.
    async fn get_order_status(&self, query: &OrderQuery) -> Result<Vec<ExchangeOrder>>;
}
