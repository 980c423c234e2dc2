// In crates/database/src/error.rs

use core_types::{DecisionId, Symbol};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to the database")]
    ConnectionError(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("Could not create the database directory: {0}")]
    CreateDirectory(#[source] std::io::Error),
    #[error("Database operation failed")]
    OperationFailed(#[source] sqlx::Error),

    #[error("Decision {0} is already recorded")]
    DuplicateDecision(DecisionId),
    #[error("Pair {pair} already has unresolved order {decision_id}")]
    UnresolvedOrderExists { pair: Symbol, decision_id: DecisionId },
    #[error("No order recorded for decision {0}")]
    NotFound(DecisionId),
    #[error("Illegal status change for {decision_id}: {source}")]
    IllegalTransition {
        decision_id: DecisionId,
        #[source]
        source: core_types::Error,
    },
    #[error("Corrupt row for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl Error {
    /// Lock contention or a momentarily unavailable connection; the same
    /// operation may succeed when retried.
    pub fn is_transient(&self) -> bool {
        let (Error::ConnectionError(e) | Error::OperationFailed(e)) = self else {
            return false;
        };
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
            // SQLITE_BUSY and SQLITE_LOCKED, including their extended codes.
            sqlx::Error::Database(db) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
