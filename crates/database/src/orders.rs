// In crates/database/src/orders.rs

use chrono::{DateTime, Utc};
use core_types::{
    DecisionId, OrderIntent, OrderOutcome, OrderRecord, OrderStatus, Side, Symbol,
};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use std::str::FromStr;

use crate::{Db, Error, Result};

/// Statuses that block new orders on a pair.
const UNRESOLVED: [OrderStatus; 2] = [OrderStatus::Submitted, OrderStatus::Unknown];

const RECORD_COLUMNS: &str = "decision_id, pair, side, quantity, created_at, exchange_order_id, \
     status, last_checked_at, reconciliation_attempts, escalated";

fn column<'r, T>(row: &'r SqliteRow, key: &str, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| Error::Corrupt {
        key: key.to_string(),
        reason: format!("column {name}: {e}"),
    })
}

fn parse<T: FromStr>(key: &str, name: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| Error::Corrupt {
        key: key.to_string(),
        reason: format!("bad {name}: {raw:?}"),
    })
}

fn timestamp(key: &str, name: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| Error::Corrupt {
        key: key.to_string(),
        reason: format!("bad {name}: {millis}"),
    })
}

fn decode_record(row: &SqliteRow) -> Result<OrderRecord> {
    let id: String = column(row, "?", "decision_id")?;
    let key = id.as_str();

    let pair: String = column(row, key, "pair")?;
    let side: String = column(row, key, "side")?;
    let quantity: String = column(row, key, "quantity")?;
    let created_at: i64 = column(row, key, "created_at")?;
    let exchange_order_id: Option<String> = column(row, key, "exchange_order_id")?;
    let status: String = column(row, key, "status")?;
    let last_checked_at: i64 = column(row, key, "last_checked_at")?;
    let attempts: i64 = column(row, key, "reconciliation_attempts")?;
    let escalated: bool = column(row, key, "escalated")?;

    let decision_id = DecisionId(id.clone());
    Ok(OrderRecord {
        intent: OrderIntent {
            decision_id: decision_id.clone(),
            pair: Symbol(pair),
            side: parse::<Side>(key, "side", &side)?,
            quantity: parse::<Decimal>(key, "quantity", &quantity)?,
            created_at: timestamp(key, "created_at", created_at)?,
        },
        outcome: OrderOutcome {
            decision_id,
            exchange_order_id,
            status: parse::<OrderStatus>(key, "status", &status)?,
            last_checked_at: timestamp(key, "last_checked_at", last_checked_at)?,
        },
        reconciliation_attempts: u32::try_from(attempts).map_err(|_| Error::Corrupt {
            key: key.to_string(),
            reason: format!("bad reconciliation_attempts: {attempts}"),
        })?,
        escalated,
    })
}

impl Db {
    /// Write-ahead: stores a new intent as `Submitted` before the exchange is called.
    ///
    /// Fails with `DuplicateDecision` if the decision is already known and with
    /// `UnresolvedOrderExists` if the pair still has a Submitted or Unknown order.
    pub async fn record_intent(&self, intent: &OrderIntent) -> Result<()> {
        // A single statement takes the write lock before the pair check.
        let sql = format!(
            "INSERT INTO order_records \
             (decision_id, pair, side, quantity, created_at, exchange_order_id, status, last_checked_at) \
             SELECT ?, ?, ?, ?, ?, NULL, ?, ? \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM order_records WHERE pair = ? AND status IN ({}) \
             ) \
             ON CONFLICT (decision_id) DO NOTHING",
            UNRESOLVED.map(|s| format!("'{}'", s.as_str())).join(", ")
        );
        let created_at = intent.created_at.timestamp_millis();
        let result = sqlx::query(&sql)
            .bind(intent.decision_id.as_str())
            .bind(&intent.pair.0)
            .bind(intent.side.as_str())
            .bind(intent.quantity.to_string())
            .bind(created_at)
            .bind(OrderStatus::Submitted.as_str())
            .bind(created_at)
            .bind(&intent.pair.0)
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        if result.rows_affected() == 0 {
            if self.get(&intent.decision_id).await?.is_some() {
                return Err(Error::DuplicateDecision(intent.decision_id.clone()));
            }
            let blocking = self.latest_unresolved(&intent.pair).await?;
            return Err(Error::UnresolvedOrderExists {
                pair: intent.pair.clone(),
                decision_id: blocking
                    .map(|r| r.intent.decision_id)
                    .unwrap_or_else(|| intent.decision_id.clone()),
            });
        }

        tracing::debug!(decision_id = %intent.decision_id, "Intent recorded.");
        Ok(())
    }

    /// Applies an outcome, refusing moves the order state machine does not allow.
    pub async fn update_outcome(&self, outcome: &OrderOutcome) -> Result<()> {
        self.transition(
            &outcome.decision_id,
            outcome.status,
            outcome.exchange_order_id.as_deref(),
            outcome.last_checked_at,
        )
        .await
    }

    /// Moves a `Submitted` record to `Unknown`, keeping any exchange id.
    pub async fn mark_unknown(&self, decision_id: &DecisionId, at: DateTime<Utc>) -> Result<()> {
        self.transition(decision_id, OrderStatus::Unknown, None, at).await
    }

    async fn transition(
        &self,
        decision_id: &DecisionId,
        next: OrderStatus,
        exchange_order_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let predecessors = OrderStatus::predecessors(next);
        if !predecessors.is_empty() {
            let sql = format!(
                "UPDATE order_records \
                 SET status = ?, exchange_order_id = COALESCE(?, exchange_order_id), last_checked_at = ? \
                 WHERE decision_id = ? AND status IN ({})",
                predecessors
                    .iter()
                    .map(|s| format!("'{}'", s.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let result = sqlx::query(&sql)
                .bind(next.as_str())
                .bind(exchange_order_id)
                .bind(at.timestamp_millis())
                .bind(decision_id.as_str())
                .execute(&self.0)
                .await
                .map_err(Error::OperationFailed)?;

            if result.rows_affected() == 1 {
                tracing::debug!(%decision_id, to = %next, "Order status updated.");
                return Ok(());
            }
        }

        // Nothing moved: report why.
        let record = self
            .get(decision_id)
            .await?
            .ok_or_else(|| Error::NotFound(decision_id.clone()))?;
        let source = match record.status().ensure_transition(next) {
            Err(source) => source,
            // Only reachable if the record changed between the two statements.
            Ok(()) => core_types::Error::IllegalTransition {
                from: record.status(),
                to: next,
            },
        };
        Err(Error::IllegalTransition {
            decision_id: decision_id.clone(),
            source,
        })
    }

    /// Counts one more failed reconciliation attempt and returns the new total.
    pub async fn bump_reconciliation_attempt(
        &self,
        decision_id: &DecisionId,
        at: DateTime<Utc>,
    ) -> Result<u32> {
        let attempts: Option<i64> = sqlx::query_scalar(
            "UPDATE order_records \
             SET reconciliation_attempts = reconciliation_attempts + 1, last_checked_at = ? \
             WHERE decision_id = ? \
             RETURNING reconciliation_attempts",
        )
        .bind(at.timestamp_millis())
        .bind(decision_id.as_str())
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        let attempts = attempts.ok_or_else(|| Error::NotFound(decision_id.clone()))?;
        u32::try_from(attempts).map_err(|_| Error::Corrupt {
            key: decision_id.0.clone(),
            reason: format!("bad reconciliation_attempts: {attempts}"),
        })
    }

    /// Flags a record for manual review.
    pub async fn mark_escalated(&self, decision_id: &DecisionId) -> Result<()> {
        let result = sqlx::query("UPDATE order_records SET escalated = 1 WHERE decision_id = ?")
            .bind(decision_id.as_str())
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(decision_id.clone()));
        }
        Ok(())
    }

    pub async fn get(&self, decision_id: &DecisionId) -> Result<Option<OrderRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM order_records WHERE decision_id = ?");
        let row = sqlx::query(&sql)
            .bind(decision_id.as_str())
            .fetch_optional(&self.0)
            .await
            .map_err(Error::OperationFailed)?;
        row.as_ref().map(decode_record).transpose()
    }

    /// The Submitted or Unknown record blocking new orders on `pair`, if any.
    pub async fn latest_unresolved(&self, pair: &Symbol) -> Result<Option<OrderRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM order_records \
             WHERE pair = ? AND status IN ('Submitted', 'Unknown') \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(&pair.0)
            .fetch_optional(&self.0)
            .await
            .map_err(Error::OperationFailed)?;
        row.as_ref().map(decode_record).transpose()
    }

    /// Every Unknown record, oldest first.
    pub async fn list_unknown(&self) -> Result<Vec<OrderRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM order_records WHERE status = 'Unknown' ORDER BY created_at"
        );
        self.fetch_records(sqlx::query(&sql)).await
    }

    pub async fn list_unknown_for(&self, pair: &Symbol) -> Result<Vec<OrderRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM order_records \
             WHERE status = 'Unknown' AND pair = ? ORDER BY created_at"
        );
        self.fetch_records(sqlx::query(&sql).bind(&pair.0)).await
    }

    /// Records still `Submitted`, i.e. interrupted between write-ahead and outcome.
    pub async fn submitted_for(&self, pair: &Symbol) -> Result<Vec<OrderRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM order_records \
             WHERE status = 'Submitted' AND pair = ? ORDER BY created_at"
        );
        self.fetch_records(sqlx::query(&sql).bind(&pair.0)).await
    }

    async fn fetch_records<'q>(
        &self,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Vec<OrderRecord>> {
        let rows = query
            .fetch_all(&self.0)
            .await
            .map_err(Error::OperationFailed)?;
        rows.iter().map(decode_record).collect()
    }
}
