// In crates/risk/src/lib.rs

use core_types::{Balance, Side};
use rust_decimal::Decimal;

pub mod error;
pub mod simple_manager;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use simple_manager::RuleBasedSizer;
pub use types::{SizingRule, SizingSettings};

/// The quantity and value of an order that passed sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub side: Side,
    pub quantity: Decimal,
    pub notional: Decimal,
}

/// The universal interface for position sizing.
///
/// A `PositionSizer` turns a freshly fetched funding balance into the quantity
/// of a single order, or refuses when the balance cannot back one.
pub trait PositionSizer: Send + Sync {
    /// The name of the sizing policy.
    fn name(&self) -> &'static str;

    /// Sizes an order for `side` at `price`.
    ///
    /// # Arguments
    ///
    /// * `side`: The side the signal asks for.
    /// * `funding`: Balance of the quote asset for a Buy, the base asset for a Sell.
    /// * `price`: The latest observed price of the pair.
    ///
    /// # Returns
    ///
    /// * `Ok(OrderPlan)`: The order may be placed.
    /// * `Err(Error::InsufficientBalance | Error::BelowMinimumNotional)`: No order.
    fn plan(&self, side: Side, funding: &Balance, price: Decimal) -> Result<OrderPlan>;
}
