// In crates/core-types/src/lib.rs

pub mod error;
pub mod order;
pub mod types;
pub mod window;

// Re-export the most important types for easy access from other crates.
pub use error::{Error, Result};
pub use order::{
    DecisionId, ExchangeOrder, ExchangeOrderStatus, OrderIntent, OrderOutcome, OrderQuery,
    OrderRecord, OrderStatus,
};
pub use types::{Balance, Side, Signal, Symbol, TradingPair};
pub use window::{PricePoint, PriceWindow};
