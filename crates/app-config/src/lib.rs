// In crates/app-config/src/lib.rs

use config::{Config, Environment, File};
use std::path::Path;

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::Settings;

/// Loads the application settings from the `config/` directory.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables.
pub fn load_settings() -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());
    load_settings_from(Path::new("config"), &environment)
}

/// Same layering as [`load_settings`], rooted at an explicit directory.
pub fn load_settings_from(dir: &Path, environment: &str) -> Result<Settings> {
    let settings = Config::builder()
        // 1. Load the base configuration file.
        .add_source(File::from(dir.join("base")))
        // 2. Load the environment-specific configuration file.
        .add_source(File::from(dir.join(environment)).required(false))
        // 3. Load settings from environment variables (e.g., `APP_EXCHANGE__API_KEY=...`).
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk::SizingRule;
    use rust_decimal_macros::dec;
    use std::fs;

    const BASE: &str = r#"
[app]
environment = "test"
log_level = "info"

[app.paper_balances]
USDT = "1000"

[exchange]
rest_base_url = "https://api.binance.com"

[database]
url = "sqlite::memory:"

[trading]
short_period = 5
long_period = 20
decision_interval_seconds = 60
staleness_threshold_seconds = 180

[[trading.pairs]]
symbol = "BTCUSDT"
base_asset = "BTC"
quote_asset = "USDT"

[[trading.pairs]]
symbol = "ETHUSDT"
base_asset = "ETH"
quote_asset = "USDT"
enabled = false

[sizing]
min_order_notional = "10"

[sizing.rule]
kind = "fixed_fraction"
fraction = "0.25"
"#;

    #[test]
    fn test_load_layered_settings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.toml"), BASE).unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            "[trading]\nshort_period = 10\n",
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), "staging").unwrap();

        assert_eq!(settings.trading.short_period, 10);
        assert_eq!(settings.trading.long_period, 20);
        assert!(settings.app.dry_run);
        assert_eq!(settings.app.paper_balances.get("USDT"), Some(&dec!(1000)));
        assert_eq!(
            settings.sizing.rule,
            SizingRule::FixedFraction { fraction: dec!(0.25) }
        );
        assert_eq!(settings.sizing.sell_fraction, dec!(1));
        assert_eq!(settings.app.paper_fee_rate, dec!(0.001));
        assert_eq!(settings.reconciliation.max_reconciliation_attempts, 5);
        assert_eq!(settings.timeouts.order_submit_seconds, 10);
        assert_eq!(settings.trading.candle_interval, "1m");

        let pairs = settings.enabled_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].symbol.0, "BTCUSDT");
    }

    #[test]
    fn test_rejects_inverted_periods() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.toml"), BASE).unwrap();
        fs::write(
            dir.path().join("broken.toml"),
            "[trading]\nshort_period = 30\n",
        )
        .unwrap();

        let result = load_settings_from(dir.path(), "broken");
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn test_missing_base_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_settings_from(dir.path(), "development"),
            Err(Error::LoadError(_))
        ));
    }
}
