// In crates/engine/src/cycle.rs

use app_config::types::TimeoutSettings;
use chrono::{DateTime, Utc};
use core_types::{DecisionId, OrderIntent, OrderOutcome, OrderStatus, PriceWindow, TradingPair};
use database::Db;
use execution::{AccountGateway, GatewayError, MarketDataSource};
use risk::PositionSizer;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strategies::SignalEngine;

use crate::{Error, Result};

const OUTCOME_WRITE_ATTEMPTS: u32 = 3;
const OUTCOME_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Why a cycle ended without touching the exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The price window could not be fetched.
    FetchFailed(GatewayError),
    /// The exchange returned prices that do not form a valid window.
    InvalidData(core_types::Error),
    /// The newest price point is older than the staleness threshold.
    StaleData { newest: DateTime<Utc> },
    /// Fewer points than the long period.
    InsufficientData(strategies::Error),
    /// This exact decision was already recorded.
    DuplicateDecision(DecisionId),
    /// The pair still has a Submitted or Unknown order.
    UnresolvedOrder(DecisionId),
    /// The funding balance could not be fetched in time.
    BalanceUnavailable(GatewayError),
    /// The sizing rule produced no placeable order.
    InsufficientBalance(risk::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Hold,
    /// An order was submitted; `status` is where the write-ahead record ended up.
    Executed {
        decision_id: DecisionId,
        status: OrderStatus,
        /// The gateway failure behind a Failed or Unknown status.
        error: Option<GatewayError>,
    },
}

/// Runs `call` under `limit`, reporting an elapsed limit as a gateway timeout.
async fn with_timeout<T, F>(limit: Duration, call: F) -> execution::Result<T>
where
    F: Future<Output = execution::Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout),
    }
}

/// One serialized evaluation of a single trading pair.
pub struct DecisionCycle {
    pair: TradingPair,
    market: Arc<dyn MarketDataSource>,
    account: Arc<dyn AccountGateway>,
    tracker: Db,
    signal_engine: SignalEngine,
    sizer: Arc<dyn PositionSizer>,
    timeouts: TimeoutSettings,
    staleness_threshold: chrono::Duration,
}

impl DecisionCycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pair: TradingPair,
        market: Arc<dyn MarketDataSource>,
        account: Arc<dyn AccountGateway>,
        tracker: Db,
        signal_engine: SignalEngine,
        sizer: Arc<dyn PositionSizer>,
        timeouts: TimeoutSettings,
        staleness_threshold: chrono::Duration,
    ) -> Self {
        Self {
            pair,
            market,
            account,
            tracker,
            signal_engine,
            sizer,
            timeouts,
            staleness_threshold,
        }
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    pub fn signal_engine(&self) -> &SignalEngine {
        &self.signal_engine
    }

    /// Seeds the signal engine with the averages saved by an earlier run.
    pub async fn restore_state(&mut self) -> Result<()> {
        if let Some(previous) = self.tracker.load_signal_state(&self.pair.symbol).await? {
            tracing::info!(
                pair = %self.pair.symbol,
                short_sma = %previous.short,
                long_sma = %previous.long,
                "Restored moving averages from the tracker."
            );
            self.signal_engine.restore(previous);
        }
        Ok(())
    }

    /// Runs one evaluation and logs its outcome.
    ///
    /// Only tracker failures are returned as errors; every other problem ends
    /// the cycle as [`CycleOutcome::Skipped`].
    pub async fn run_once(&mut self) -> Result<CycleOutcome> {
        let outcome = self.evaluate().await?;
        self.log_outcome(&outcome);
        Ok(outcome)
    }

    async fn evaluate(&mut self) -> Result<CycleOutcome> {
        // --- 1. Fetch and vet the price window ---
        let window = match self.fetch_window().await {
            Ok(window) => window,
            Err(reason) => return Ok(CycleOutcome::Skipped(reason)),
        };

        // --- 2. Signal ---
        let signal = match self.signal_engine.compute_signal(&window) {
            Ok(signal) => signal,
            Err(e) => return Ok(CycleOutcome::Skipped(SkipReason::InsufficientData(e))),
        };
        if let Some(averages) = self.signal_engine.previous() {
            self.tracker
                .save_signal_state(&self.pair.symbol, &averages, Utc::now())
                .await?;
        }
        let Some(side) = signal.side() else {
            return Ok(CycleOutcome::Hold);
        };

        // --- 3. Idempotency and backpressure ---
        let decision_id = DecisionId::for_decision(&self.pair.symbol, window.newest().timestamp, side);
        if self.tracker.get(&decision_id).await?.is_some() {
            return Ok(CycleOutcome::Skipped(SkipReason::DuplicateDecision(decision_id)));
        }
        if let Some(blocking) = self.tracker.latest_unresolved(&self.pair.symbol).await? {
            return Ok(CycleOutcome::Skipped(SkipReason::UnresolvedOrder(
                blocking.intent.decision_id,
            )));
        }

        // --- 4. Fresh balance and sizing ---
        let asset = self.pair.funding_asset(side);
        let balance = match with_timeout(self.timeouts.balance(), self.account.get_balance(asset)).await {
            Ok(balance) => balance,
            Err(e) => return Ok(CycleOutcome::Skipped(SkipReason::BalanceUnavailable(e))),
        };
        let plan = match self.sizer.plan(side, &balance, window.latest_price()) {
            Ok(plan) => plan,
            Err(e) => return Ok(CycleOutcome::Skipped(SkipReason::InsufficientBalance(e))),
        };

        // --- 5. Write-ahead ---
        let intent = OrderIntent {
            decision_id: decision_id.clone(),
            pair: self.pair.symbol.clone(),
            side,
            quantity: plan.quantity,
            created_at: Utc::now(),
        };
        match self.tracker.record_intent(&intent).await {
            Ok(()) => {}
            Err(database::Error::DuplicateDecision(id)) => {
                return Ok(CycleOutcome::Skipped(SkipReason::DuplicateDecision(id)));
            }
            Err(database::Error::UnresolvedOrderExists { decision_id, .. }) => {
                return Ok(CycleOutcome::Skipped(SkipReason::UnresolvedOrder(decision_id)));
            }
            Err(e) => return Err(Error::Storage(e)),
        }

        // --- 6. Submit, then record what we learned ---
        let submitted = with_timeout(
            self.timeouts.order_submit(),
            self.account.submit_order(&intent),
        )
        .await;

        let (status, exchange_order_id, error) = match submitted {
            Ok(exchange_order_id) => (OrderStatus::Confirmed, Some(exchange_order_id), None),
            Err(e) if e.is_indeterminate() => (OrderStatus::Unknown, None, Some(e)),
            Err(e) => (OrderStatus::Failed, None, Some(e)),
        };

        self.record_outcome(&OrderOutcome {
            decision_id: decision_id.clone(),
            exchange_order_id,
            status,
            last_checked_at: Utc::now(),
        })
        .await?;

        Ok(CycleOutcome::Executed {
            decision_id,
            status,
            error,
        })
    }

    /// Writes the submission outcome, retrying while the tracker is busy.
    ///
    /// If every attempt fails the record stays `Submitted`; the next
    /// reconciliation pass moves it to `Unknown`.
    async fn record_outcome(&self, outcome: &OrderOutcome) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.tracker.update_outcome(outcome).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < OUTCOME_WRITE_ATTEMPTS => {
                    tracing::warn!(
                        pair = %self.pair.symbol,
                        decision_id = %outcome.decision_id,
                        attempt,
                        error = %e,
                        "Tracker busy; retrying outcome write."
                    );
                    tokio::time::sleep(OUTCOME_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(Error::Storage(e)),
            }
        }
    }

    async fn fetch_window(&self) -> std::result::Result<PriceWindow, SkipReason> {
        let count = self.signal_engine.settings().window_len();
        let window = with_timeout(
            self.timeouts.data_fetch(),
            self.market.get_recent_prices(&self.pair, count),
        )
        .await
        .map_err(|e| match e {
            GatewayError::InvalidData(data) => SkipReason::InvalidData(data),
            other => SkipReason::FetchFailed(other),
        })?;

        window
            .ensure_fresh(Utc::now(), self.staleness_threshold)
            .map_err(|_| SkipReason::StaleData {
                newest: window.newest().timestamp,
            })?;
        Ok(window)
    }

    fn log_outcome(&self, outcome: &CycleOutcome) {
        let pair = &self.pair.symbol;
        match outcome {
            CycleOutcome::Hold => tracing::info!(%pair, "Cycle complete: hold."),
            CycleOutcome::Skipped(reason @ (SkipReason::FetchFailed(_)
            | SkipReason::InvalidData(_)
            | SkipReason::StaleData { .. }
            | SkipReason::BalanceUnavailable(_))) => {
                tracing::warn!(%pair, ?reason, "Cycle skipped.")
            }
            CycleOutcome::Skipped(reason) => tracing::info!(%pair, ?reason, "Cycle skipped."),
            CycleOutcome::Executed {
                decision_id,
                status: OrderStatus::Unknown,
                error,
            } => tracing::warn!(
                %pair,
                %decision_id,
                ?error,
                "Order outcome unknown; left for reconciliation."
            ),
            CycleOutcome::Executed {
                decision_id,
                status: OrderStatus::Failed,
                error,
            } => tracing::warn!(%pair, %decision_id, ?error, "Order submission failed."),
            CycleOutcome::Executed {
                decision_id,
                status,
                ..
            } => tracing::info!(%pair, %decision_id, %status, "Order executed."),
        }
    }
}
