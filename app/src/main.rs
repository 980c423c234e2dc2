// In app/src/main.rs

use anyhow::{Context, Result};
use api_client::ApiClient;
use app_config::Settings;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use core_types::{DecisionId, OrderOutcome, OrderStatus};
use database::Db;
use engine::Engine;
use execution::{AccountGateway, BinanceGateway, MarketDataSource, PaperGateway};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::prelude::*;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "A moving-average crossover trading engine for Binance spot pairs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the trading engine until Ctrl-C.
    Run,

    /// Lists orders whose outcome is still unknown.
    Unknown,

    /// Records the outcome of an unresolved order after manual review.
    Resolve {
        /// The decision id of the order (e.g., "BTCUSDT-1700000000000-B").
        decision_id: String,

        /// What the exchange says happened to the order.
        #[arg(long, value_enum)]
        status: Resolution,

        /// The exchange's order id, if known.
        #[arg(long)]
        exchange_order_id: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Resolution {
    Confirmed,
    Failed,
}

impl From<Resolution> for OrderStatus {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Confirmed => OrderStatus::Confirmed,
            Resolution::Failed => OrderStatus::Failed,
        }
    }
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = app_config::load_settings().context("failed to load settings")?;
    init_tracing(&settings);

    tracing::info!(environment = %settings.app.environment, "Starting trading engine application");

    match cli.command {
        Commands::Run => run_app(settings).await?,
        Commands::Unknown => list_unknown(&settings).await?,
        Commands::Resolve {
            decision_id,
            status,
            exchange_order_id,
        } => resolve(&settings, DecisionId(decision_id), status.into(), exchange_order_id).await?,
    }

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let level = tracing::Level::from_str(&settings.app.log_level).unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx", tracing::Level::WARN) // Disable sqlx query debug logs
            .with_target("hyper", tracing::Level::WARN)
            .with_target("reqwest", tracing::Level::WARN)
            .with_default(level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();
}

// --- "Run" Subcommand Logic ---

/// Wires the gateways and tracker, then runs the engine until Ctrl-C.
async fn run_app(settings: Settings) -> Result<()> {
    // --- 1. Initialization ---
    let tracker = database::connect(&settings.database).await?;
    tracing::info!("Execution tracker opened and migrations are up-to-date.");

    // --- 2. Gateways ---
    let api_client = ApiClient::new(&settings.exchange)?;
    let binance = Arc::new(BinanceGateway::new(
        api_client,
        settings.trading.candle_interval.clone(),
    ));
    let market: Arc<dyn MarketDataSource> = binance.clone();

    let account: Arc<dyn AccountGateway> = if settings.app.dry_run {
        tracing::info!(
            balances = ?settings.app.paper_balances,
            fee_rate = %settings.app.paper_fee_rate,
            "Dry run: orders go to the paper account."
        );
        Arc::new(PaperGateway::new(
            market.clone(),
            &settings.enabled_pairs(),
            settings.app.paper_balances.clone(),
            settings.app.paper_fee_rate,
        ))
    } else {
        tracing::warn!("LIVE TRADING IS ENABLED. REAL ORDERS WILL BE PLACED.");
        binance
    };

    // --- 3. Shutdown signal ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received; finishing in-flight cycles."),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C; shutting down."),
        }
        let _ = shutdown_tx.send(true);
    });

    // --- 4. Run ---
    let engine = Engine::new(settings, tracker.clone(), market, account);
    engine.run(shutdown_rx).await?;

    tracker.close().await;
    tracing::info!("Application has finished successfully.");
    Ok(())
}

// --- Manual review subcommands ---

async fn list_unknown(settings: &Settings) -> Result<()> {
    let tracker = database::connect(&settings.database).await?;
    let records = tracker.list_unknown().await?;

    if records.is_empty() {
        println!("No orders with an unknown outcome.");
    }
    for record in &records {
        println!(
            "{}  {}  {}  {}  created={}  exchange_order_id={}  attempts={}{}",
            record.decision_id(),
            record.intent.pair,
            record.intent.side,
            record.intent.quantity,
            record.intent.created_at.to_rfc3339(),
            record.outcome.exchange_order_id.as_deref().unwrap_or("-"),
            record.reconciliation_attempts,
            if record.escalated { "  ESCALATED" } else { "" },
        );
    }

    tracker.close().await;
    Ok(())
}

async fn resolve(
    settings: &Settings,
    decision_id: DecisionId,
    status: OrderStatus,
    exchange_order_id: Option<String>,
) -> Result<()> {
    let tracker: Db = database::connect(&settings.database).await?;

    let record = tracker
        .get(&decision_id)
        .await?
        .with_context(|| format!("no order recorded for decision {decision_id}"))?;
    // A Submitted record here was left by a crash before recovery ran.
    if !record.status().is_unresolved() {
        anyhow::bail!(
            "order {decision_id} is already {}; only Submitted or Unknown orders can be resolved by hand",
            record.status()
        );
    }

    tracker
        .update_outcome(&OrderOutcome {
            decision_id: decision_id.clone(),
            exchange_order_id,
            status,
            last_checked_at: Utc::now(),
        })
        .await?;
    tracing::info!(%decision_id, %status, "Order resolved manually.");

    tracker.close().await;
    Ok(())
}
