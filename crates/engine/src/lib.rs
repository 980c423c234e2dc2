// In crates/engine/src/lib.rs

pub mod cycle;
pub mod error;
pub mod reconciler;
pub mod task;

pub use cycle::{CycleOutcome, DecisionCycle, SkipReason};
pub use error::{Error, Result};
pub use reconciler::{ReconcileReport, Reconciler};
pub use task::PairTask;

use app_config::Settings;
use database::Db;
use execution::{AccountGateway, MarketDataSource};
use futures::future;
use risk::{PositionSizer, RuleBasedSizer};
use std::sync::Arc;
use std::time::Duration;
use strategies::SignalEngine;
use tokio::sync::watch;

/// The orchestrator for all trading pairs.
pub struct Engine {
    settings: Settings,
    tracker: Db,
    market: Arc<dyn MarketDataSource>,
    account: Arc<dyn AccountGateway>,
}

impl Engine {
    pub fn new(
        settings: Settings,
        tracker: Db,
        market: Arc<dyn MarketDataSource>,
        account: Arc<dyn AccountGateway>,
    ) -> Self {
        Self {
            settings,
            tracker,
            market,
            account,
        }
    }

    /// Wires the cycle and reconciler for every enabled pair.
    pub fn build_tasks(&self) -> Result<Vec<PairTask>> {
        let settings = &self.settings;
        let sizer: Arc<dyn PositionSizer> = Arc::new(RuleBasedSizer::new(settings.sizing.clone())?);
        let staleness = chrono::Duration::seconds(settings.trading.staleness_threshold_seconds as i64);

        let mut tasks = Vec::new();
        for pair in settings.enabled_pairs() {
            tracing::info!(pair = %pair.symbol, "Setting up pair task.");

            let cycle = DecisionCycle::new(
                pair,
                self.market.clone(),
                self.account.clone(),
                self.tracker.clone(),
                SignalEngine::new(settings.ma_crossover())?,
                sizer.clone(),
                settings.timeouts.clone(),
                staleness,
            );
            let reconciler = Reconciler::new(
                self.account.clone(),
                self.tracker.clone(),
                settings.reconciliation.clone(),
                settings.timeouts.data_fetch(),
            );
            tasks.push(PairTask::new(
                cycle,
                reconciler,
                Duration::from_secs(settings.trading.decision_interval_seconds),
                Duration::from_secs(settings.reconciliation.interval_seconds),
            ));
        }

        if tasks.is_empty() {
            return Err(Error::NoPairs);
        }
        Ok(tasks)
    }

    /// Spawns one `PairTask` per enabled pair and waits for all of them.
    ///
    /// A pair whose task fails (tracker failure) stops trading; the others
    /// keep running until `shutdown` flips.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            market = self.market.name(),
            account = self.account.name(),
            "Initializing trading engine..."
        );

        let mut pairs = Vec::new();
        let mut task_handles = Vec::new();
        for task in self.build_tasks()? {
            pairs.push(task.symbol().clone());
            task_handles.push(tokio::spawn(task.run(shutdown.clone())));
        }

        tracing::info!(count = task_handles.len(), "All pair tasks have been spawned.");

        let results = future::join_all(task_handles).await;
        for (pair, result) in pairs.iter().zip(results) {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(%pair, error = %e, "Pair task halted; trading stopped for this pair.")
                }
                Err(e) => tracing::error!(%pair, error = %e, "Pair task panicked."),
            }
        }

        tracing::info!("Engine stopped.");
        Ok(())
    }
}
