// In crates/database/src/lib.rs

use app_config::types::DatabaseSettings;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

pub mod error;
mod orders;
mod signals;

// Re-export the most important types for easy access.
pub use error::{Error, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A wrapper around the `sqlx` connection pool.
///
/// This is the execution tracker: the durable store of order intents,
/// their outcomes, and the per-symbol signal state.
#[derive(Debug, Clone)]
pub struct Db(SqlitePool);

/// Opens (creating if needed) the SQLite database and runs migrations.
///
/// Every commit is flushed to disk before it returns (WAL journal with
/// `synchronous = FULL`), so an acknowledged write survives a crash.
///
/// # Arguments
///
/// * `settings`: The database configuration settings.
///
/// # Returns
///
/// A `Result` containing the `Db` wrapper on success, or an `Error` on failure.
pub async fn connect(settings: &DatabaseSettings) -> Result<Db> {
    let options = SqliteConnectOptions::from_str(&settings.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(BUSY_TIMEOUT);

    if let Some(dir) = options.get_filename().parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(Error::CreateDirectory)?;
        }
    }

    // The `?` operator uses the `#[from]` attribute in our error enum
    // to automatically convert the `sqlx::Error` into a `database::Error`.
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Db::migrated(pool).await
}

impl Db {
    /// A private in-memory database. Used by tests and dry runs that should leave nothing behind.
    pub async fn connect_in_memory() -> Result<Db> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A memory database lives exactly as long as its single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Db::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Db> {
        // Run database migrations. This ensures the database schema is up-to-date.
        sqlx::migrate!("../../migrations").run(&pool).await?;
        Ok(Db(pool))
    }

    /// Closes every connection; later operations fail.
    pub async fn close(&self) {
        self.0.close().await;
    }
}
