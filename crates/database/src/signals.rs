// In crates/database/src/signals.rs

use chrono::{DateTime, Utc};
use core_types::Symbol;
use rust_decimal::Decimal;
use strategies::AveragePair;

use crate::{Db, Error, Result};

impl Db {
    /// Averages from the last evaluation of `symbol`, if one was saved.
    pub async fn load_signal_state(&self, symbol: &Symbol) -> Result<Option<AveragePair>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT short_sma, long_sma FROM signal_state WHERE symbol = ?")
                .bind(&symbol.0)
                .fetch_optional(&self.0)
                .await
                .map_err(Error::OperationFailed)?;

        let Some((short, long)) = row else {
            return Ok(None);
        };
        let decode = |raw: &str| {
            raw.parse::<Decimal>().map_err(|_| Error::Corrupt {
                key: symbol.0.clone(),
                reason: format!("bad moving average: {raw:?}"),
            })
        };
        Ok(Some(AveragePair {
            short: decode(&short)?,
            long: decode(&long)?,
        }))
    }

    pub async fn save_signal_state(
        &self,
        symbol: &Symbol,
        averages: &AveragePair,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO signal_state (symbol, short_sma, long_sma, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (symbol) DO UPDATE SET \
                short_sma = excluded.short_sma, \
                long_sma = excluded.long_sma, \
                updated_at = excluded.updated_at",
        )
        .bind(&symbol.0)
        .bind(averages.short.to_string())
        .bind(averages.long.to_string())
        .bind(at.timestamp_millis())
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;
        Ok(())
    }
}
