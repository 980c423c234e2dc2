// In crates/strategies/src/lib.rs

pub mod error;
pub mod ma_crossover;
pub mod types;

pub use error::{Error, Result};
pub use ma_crossover::{AveragePair, SignalEngine, crossover, sma};
pub use types::MACrossoverSettings;
