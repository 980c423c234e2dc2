// In crates/engine/src/error.rs

use thiserror::Error;

/// Errors that stop a pair task.
///
/// Everything else a cycle can run into is reported as a skipped cycle.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Execution tracker failure: {0}")]
    Storage(#[from] database::Error),

    #[error("Invalid strategy configuration: {0}")]
    Strategy(#[from] strategies::Error),

    #[error("Invalid sizing configuration: {0}")]
    Sizing(#[from] risk::Error),

    #[error("No trading pairs are enabled")]
    NoPairs,
}

impl Error {
    /// A tracker failure worth retrying on a later tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Storage(e) if e.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
