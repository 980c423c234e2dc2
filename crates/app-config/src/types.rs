// In crates/app-config/src/types.rs

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::{Error, Result};
use core_types::TradingPair;
use risk::types::SizingSettings;
use strategies::types::MACrossoverSettings;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the exchange REST API.
    pub exchange: ExchangeSettings,
    /// Settings for the execution tracker database.
    pub database: DatabaseSettings,
    pub trading: TradingSettings,
    pub sizing: SizingSettings,
    #[serde(default)]
    pub reconciliation: ReconciliationSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
    /// When set, orders go to the paper account instead of the exchange.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    /// Starting balances of the paper account, keyed by asset.
    #[serde(default)]
    pub paper_balances: HashMap<String, Decimal>,
    /// Fee the paper account takes from the received asset of each fill.
    #[serde(default = "default_paper_fee_rate")]
    pub paper_fee_rate: Decimal,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExchangeSettings {
    /// The API key for the exchange.
    #[serde(default)]
    pub api_key: String,
    /// The secret key for the exchange.
    #[serde(default)]
    pub secret_key: String,
    /// The REST API base URL.
    pub rest_base_url: String,
    /// How long a signed request stays valid at the exchange.
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The SQLite connection URL, e.g. `sqlite://data/tracker.db`.
    pub url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TradingSettings {
    pub pairs: Vec<PairConfig>,
    pub short_period: usize,
    pub long_period: usize,
    /// Candle interval the price window is built from (e.g., "1m").
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,
    pub decision_interval_seconds: u64,
    pub staleness_threshold_seconds: u64,
}

/// Configuration for a single trading pair.
#[derive(Deserialize, Debug, Clone)]
pub struct PairConfig {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReconciliationSettings {
    #[serde(default = "default_reconciliation_interval")]
    pub interval_seconds: u64,
    /// Attempts before an Unknown order is escalated for manual review.
    #[serde(default = "default_max_reconciliation_attempts")]
    pub max_reconciliation_attempts: u32,
    /// How far after an intent's creation time the exchange history is searched.
    #[serde(default = "default_match_window")]
    pub match_window_seconds: u64,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_reconciliation_interval(),
            max_reconciliation_attempts: default_max_reconciliation_attempts(),
            match_window_seconds: default_match_window(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TimeoutSettings {
    #[serde(default = "default_data_fetch_timeout")]
    pub data_fetch_seconds: u64,
    #[serde(default = "default_order_submit_timeout")]
    pub order_submit_seconds: u64,
    #[serde(default = "default_balance_timeout")]
    pub balance_seconds: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            data_fetch_seconds: default_data_fetch_timeout(),
            order_submit_seconds: default_order_submit_timeout(),
            balance_seconds: default_balance_timeout(),
        }
    }
}

impl TimeoutSettings {
    pub fn data_fetch(&self) -> Duration {
        Duration::from_secs(self.data_fetch_seconds)
    }

    pub fn order_submit(&self) -> Duration {
        Duration::from_secs(self.order_submit_seconds)
    }

    pub fn balance(&self) -> Duration {
        Duration::from_secs(self.balance_seconds)
    }
}

impl Settings {
    /// Rejects combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.trading;
        if t.short_period == 0 || t.short_period >= t.long_period {
            return Err(Error::Invalid(format!(
                "short_period ({}) must be positive and below long_period ({})",
                t.short_period, t.long_period
            )));
        }
        if t.decision_interval_seconds == 0 || t.staleness_threshold_seconds == 0 {
            return Err(Error::Invalid(
                "decision_interval_seconds and staleness_threshold_seconds must be positive"
                    .to_string(),
            ));
        }
        if self.reconciliation.interval_seconds == 0 {
            return Err(Error::Invalid(
                "reconciliation.interval_seconds must be positive".to_string(),
            ));
        }
        if self.timeouts.data_fetch_seconds == 0
            || self.timeouts.order_submit_seconds == 0
            || self.timeouts.balance_seconds == 0
        {
            return Err(Error::Invalid("timeouts must be positive".to_string()));
        }
        if self.enabled_pairs().is_empty() {
            return Err(Error::Invalid("no enabled trading pairs".to_string()));
        }
        risk::RuleBasedSizer::new(self.sizing.clone())
            .map_err(|e| Error::Invalid(e.to_string()))?;
        Ok(())
    }

    pub fn ma_crossover(&self) -> MACrossoverSettings {
        MACrossoverSettings {
            short_period: self.trading.short_period,
            long_period: self.trading.long_period,
        }
    }

    pub fn enabled_pairs(&self) -> Vec<TradingPair> {
        self.trading
            .pairs
            .iter()
            .filter(|p| p.enabled)
            .map(|p| TradingPair::new(&p.symbol, &p.base_asset, &p.quote_asset))
            .collect()
    }
}

/// Helper functions for serde defaults
fn default_true() -> bool { true }
fn default_paper_fee_rate() -> Decimal { Decimal::new(1, 3) }
fn default_recv_window_ms() -> u64 { 5_000 }
fn default_candle_interval() -> String { "1m".to_string() }
fn default_reconciliation_interval() -> u64 { 300 }
fn default_max_reconciliation_attempts() -> u32 { 5 }
fn default_match_window() -> u64 { 600 }
fn default_data_fetch_timeout() -> u64 { 5 }
fn default_order_submit_timeout() -> u64 { 10 }
fn default_balance_timeout() -> u64 { 5 }
