// In crates/engine/src/reconciler.rs

use app_config::types::ReconciliationSettings;
use chrono::{Duration as ChronoDuration, Utc};
use core_types::{ExchangeOrder, OrderOutcome, OrderQuery, OrderRecord, Symbol};
use database::Db;
use execution::{AccountGateway, GatewayError};
use std::sync::Arc;
use std::time::Duration;

use crate::Result;

/// How far before an intent's creation time the exchange history is searched.
const LOOKBACK_SECONDS: i64 = 60;

/// Counts from one reconciliation pass over a pair.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub resolved: usize,
    pub pending: usize,
    pub escalated: usize,
}

/// Resolves Unknown orders against the exchange's order history.
///
/// It only ever reads from the exchange. An order that cannot be matched
/// stays Unknown; after `max_reconciliation_attempts` it is flagged for
/// manual review. Nothing is ever resubmitted from here.
pub struct Reconciler {
    /// The account to query for order history.
    account: Arc<dyn AccountGateway>,
    tracker: Db,
    settings: ReconciliationSettings,
    lookup_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        account: Arc<dyn AccountGateway>,
        tracker: Db,
        settings: ReconciliationSettings,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            account,
            tracker,
            settings,
            lookup_timeout,
        }
    }

    /// Moves records a crash left in `Submitted` to `Unknown`.
    ///
    /// Must run before the first decision for the pair, so a half-finished
    /// submission is reconciled instead of being decided again.
    pub async fn recover(&self, pair: &Symbol) -> Result<usize> {
        let interrupted = self.tracker.submitted_for(pair).await?;
        for record in &interrupted {
            tracing::warn!(
                %pair,
                decision_id = %record.decision_id(),
                "Found submission interrupted by a restart; marking Unknown."
            );
            self.tracker
                .mark_unknown(record.decision_id(), Utc::now())
                .await?;
        }
        Ok(interrupted.len())
    }

    /// One pass over every Unknown record of `pair`.
    pub async fn reconcile_pair(&self, pair: &Symbol) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for record in self.tracker.list_unknown_for(pair).await? {
            match self.lookup(&record).await {
                Ok(Some(order)) => {
                    let status = order.status.resolved_status();
                    self.tracker
                        .update_outcome(&OrderOutcome {
                            decision_id: record.decision_id().clone(),
                            exchange_order_id: Some(order.exchange_order_id.clone()),
                            status,
                            last_checked_at: Utc::now(),
                        })
                        .await?;
                    tracing::info!(
                        %pair,
                        decision_id = %record.decision_id(),
                        exchange_order_id = %order.exchange_order_id,
                        exchange_status = ?order.status,
                        %status,
                        "Unknown order reconciled."
                    );
                    report.resolved += 1;
                }
                Ok(None) => {
                    self.note_miss(&record, None, &mut report).await?;
                }
                Err(e) => {
                    self.note_miss(&record, Some(e), &mut report).await?;
                }
            }
        }

        Ok(report)
    }

    async fn note_miss(
        &self,
        record: &OrderRecord,
        error: Option<GatewayError>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let decision_id = record.decision_id();
        let attempts = self
            .tracker
            .bump_reconciliation_attempt(decision_id, Utc::now())
            .await?;
        report.pending += 1;

        if attempts >= self.settings.max_reconciliation_attempts && !record.escalated {
            self.tracker.mark_escalated(decision_id).await?;
            report.escalated += 1;
            tracing::error!(
                pair = %record.intent.pair,
                %decision_id,
                attempts,
                escalation = true,
                "Order could not be reconciled; manual review required."
            );
        } else {
            tracing::warn!(
                pair = %record.intent.pair,
                %decision_id,
                attempts,
                ?error,
                "Unknown order not found at the exchange yet."
            );
        }
        Ok(())
    }

    /// Queries the exchange for the order behind `record`.
    async fn lookup(&self, record: &OrderRecord) -> execution::Result<Option<ExchangeOrder>> {
        let pair = record.intent.pair.clone();
        let query = match &record.outcome.exchange_order_id {
            Some(exchange_order_id) => OrderQuery::ByExchangeId {
                pair,
                exchange_order_id: exchange_order_id.clone(),
            },
            None => OrderQuery::ByWindow {
                pair,
                from: record.intent.created_at - ChronoDuration::seconds(LOOKBACK_SECONDS),
                to: record.intent.created_at
                    + ChronoDuration::seconds(self.settings.match_window_seconds as i64),
            },
        };

        let orders = match tokio::time::timeout(
            self.lookup_timeout,
            self.account.get_order_status(&query),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(GatewayError::Timeout),
        };

        Ok(find_match(record, &orders).cloned())
    }
}

/// Picks the exchange order that corresponds to `record`.
///
/// The client order id carries the decision id, so it is tried first; the
/// exchange id next. Same side and quantity is the last resort, and only for
/// orders that carry no client order id: a different id means someone else
/// placed the order.
pub fn find_match<'a>(record: &OrderRecord, orders: &'a [ExchangeOrder]) -> Option<&'a ExchangeOrder> {
    let decision_id = record.decision_id().as_str();
    orders
        .iter()
        .find(|o| o.client_order_id.as_deref() == Some(decision_id))
        .or_else(|| {
            let known = record.outcome.exchange_order_id.as_deref()?;
            orders.iter().find(|o| o.exchange_order_id == known)
        })
        .or_else(|| {
            orders
                .iter()
                .filter(|o| o.client_order_id.is_none())
                .find(|o| o.side == record.intent.side && o.quantity == record.intent.quantity)
        })
}
