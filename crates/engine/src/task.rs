// In crates/engine/src/task.rs

use crate::cycle::DecisionCycle;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::Result;
use core_types::Symbol;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A self-contained task that runs every decision for a single pair.
///
/// Decisions and reconciliation passes for the pair are serialized on this
/// task; pairs run in parallel on separate tasks.
pub struct PairTask {
    cycle: DecisionCycle,
    reconciler: Reconciler,
    decision_interval: Duration,
    reconciliation_interval: Duration,
}

impl PairTask {
    pub fn new(
        cycle: DecisionCycle,
        reconciler: Reconciler,
        decision_interval: Duration,
        reconciliation_interval: Duration,
    ) -> Self {
        Self {
            cycle,
            reconciler,
            decision_interval,
            reconciliation_interval,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.cycle.pair().symbol
    }

    /// The main, long-running loop for this pair.
    ///
    /// Returns when `shutdown` flips to `true` (or its sender is dropped), or
    /// with an error when the execution tracker fails for good. Lock
    /// contention on the tracker only costs the current cycle. Shutdown is
    /// only observed between cycles, so a submission in flight always reaches
    /// a recorded outcome first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let symbol = self.cycle.pair().symbol.clone();
        tracing::info!(pair = %symbol, "Starting pair task.");

        // --- 1. Recovery before any decision ---
        loop {
            match self.start_up(&symbol).await {
                Ok(()) => break,
                Err(e) if e.is_transient() => {
                    tracing::warn!(pair = %symbol, error = %e, "Tracker busy during startup; retrying.");
                }
                Err(e) => return Err(e),
            }
            tokio::select! {
                biased;

                _ = shutdown.changed() => return Ok(()),
                _ = tokio::time::sleep(STARTUP_RETRY_DELAY) => {}
            }
        }

        // --- 2. Timer loop ---
        let mut decision_tick = interval(self.decision_interval);
        decision_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reconcile_tick = interval_at(
            Instant::now() + self.reconciliation_interval,
            self.reconciliation_interval,
        );
        reconcile_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = decision_tick.tick() => {
                    if let Err(e) = self.cycle.run_once().await {
                        if !e.is_transient() {
                            return Err(e);
                        }
                        tracing::warn!(pair = %symbol, error = %e, "Tracker busy; cycle abandoned.");
                    }
                }
                _ = reconcile_tick.tick() => {
                    match self.reconcile(&symbol).await {
                        Ok(report) => {
                            tracing::debug!(pair = %symbol, ?report, "Reconciliation pass complete.")
                        }
                        Err(e) if e.is_transient() => {
                            tracing::warn!(pair = %symbol, error = %e, "Tracker busy; reconciliation pass skipped.")
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        tracing::info!(pair = %symbol, "Pair task stopped.");
        Ok(())
    }

    async fn start_up(&mut self, symbol: &Symbol) -> Result<()> {
        let report = self.reconcile(symbol).await?;
        self.cycle.restore_state().await?;
        tracing::info!(pair = %symbol, ?report, "Startup reconciliation complete.");
        Ok(())
    }

    /// Recovery and one reconciliation pass.
    ///
    /// Runs only between cycles, so any record still `Submitted` was left
    /// behind by a crash or by an outcome write that never landed.
    async fn reconcile(&self, symbol: &Symbol) -> Result<ReconcileReport> {
        self.reconciler.recover(symbol).await?;
        self.reconciler.reconcile_pair(symbol).await
    }
}
