// In crates/core-types/src/error.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::order::OrderStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Price window is empty")]
    EmptyWindow,

    #[error("Price must be positive, got {price} at {timestamp}")]
    NonPositivePrice {
        price: Decimal,
        timestamp: DateTime<Utc>,
    },

    #[error("Timestamps must be strictly increasing: {previous} is not before {next}")]
    NonIncreasingTimestamps {
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    #[error("Price window is stale: newest point at {newest}, threshold {threshold_secs}s")]
    StaleWindow {
        newest: DateTime<Utc>,
        threshold_secs: i64,
    },

    #[error("Illegal order status transition {from:?} -> {to:?}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unrecognised value '{value}' for {field}")]
    UnknownVariant { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
