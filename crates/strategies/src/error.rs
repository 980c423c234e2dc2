// In crates/strategies/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Insufficient price history: have {have} points, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("Invalid moving-average periods: short={short}, long={long}")]
    InvalidPeriods { short: usize, long: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
