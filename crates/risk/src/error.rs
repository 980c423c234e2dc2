// In crates/risk/src/error.rs

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Insufficient {asset} balance: available {available}, required {required}")]
    InsufficientBalance {
        asset: String,
        available: Decimal,
        required: Decimal,
    },

    #[error("Order notional {notional} is below the minimum of {minimum}")]
    BelowMinimumNotional { notional: Decimal, minimum: Decimal },

    #[error("Invalid sizing parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, Error>;
