// Scripted collaborators shared by the engine integration tests.
#![allow(dead_code)]

use app_config::types::{ReconciliationSettings, TimeoutSettings};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use core_types::{
    Balance, ExchangeOrder, ExchangeOrderStatus, OrderIntent, OrderQuery, OrderStatus, PricePoint,
    PriceWindow, Side, TradingPair,
};
use database::Db;
use engine::{DecisionCycle, Reconciler};
use execution::{AccountGateway, GatewayError, MarketDataSource};
use risk::{PositionSizer, RuleBasedSizer, SizingRule, SizingSettings};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strategies::{AveragePair, MACrossoverSettings, SignalEngine};

pub fn btc() -> TradingPair {
    TradingPair::new("BTCUSDT", "BTC", "USDT")
}

pub fn rising() -> Vec<Decimal> {
    vec![dec!(100), dec!(102), dec!(104), dec!(106), dec!(108)]
}

pub fn falling() -> Vec<Decimal> {
    vec![dec!(108), dec!(106), dec!(104), dec!(102), dec!(100)]
}

/// Averages that make a rising window a golden cross.
pub fn below() -> AveragePair {
    AveragePair {
        short: dec!(100),
        long: dec!(101),
    }
}

/// Market data served from a queue; an empty queue is a network error.
#[derive(Default)]
pub struct ScriptedMarket {
    script: Mutex<VecDeque<Result<PriceWindow, GatewayError>>>,
    seq: AtomicI64,
    pub fetches: AtomicUsize,
}

impl ScriptedMarket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// One-minute candles ending now. Each call ends a little later than the last,
    /// so every pushed window has its own newest timestamp.
    pub fn window(&self, prices: &[Decimal], age: ChronoDuration) -> PriceWindow {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let newest = Utc::now() - age + ChronoDuration::milliseconds(seq);
        let n = prices.len() as i64;
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, p)| PricePoint::new(newest - ChronoDuration::minutes(n - 1 - i as i64), *p))
            .collect();
        PriceWindow::new(points, prices.len()).unwrap()
    }

    pub fn push_window(&self, window: PriceWindow) {
        self.script.lock().unwrap().push_back(Ok(window));
    }

    pub fn push_prices(&self, prices: &[Decimal]) -> PriceWindow {
        let window = self.window(prices, ChronoDuration::zero());
        self.push_window(window.clone());
        window
    }

    pub fn push_stale(&self, prices: &[Decimal], age: ChronoDuration) {
        let window = self.window(prices, age);
        self.push_window(window);
    }

    pub fn push_error(&self, error: GatewayError) {
        self.script.lock().unwrap().push_back(Err(error));
    }
}

#[async_trait]
impl MarketDataSource for ScriptedMarket {
    fn name(&self) -> &'static str {
        "ScriptedMarket"
    }

    async fn get_recent_prices(
        &self,
        _pair: &TradingPair,
        _count: usize,
    ) -> execution::Result<PriceWindow> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Network("script exhausted".to_string())))
    }
}

/// What the next `submit_order` call does.
pub enum Submit {
    Accept,
    Reject,
    /// The gateway reports its own timeout.
    TimeoutError,
    ConnectError,
    /// Never answers; the cycle's timeout has to fire.
    Hang,
}

#[derive(Default)]
pub struct ScriptedAccount {
    balances: Mutex<HashMap<String, Decimal>>,
    submit_script: Mutex<VecDeque<Submit>>,
    history: Mutex<Vec<ExchangeOrder>>,
    tracker: Mutex<Option<Db>>,
    next_id: AtomicUsize,
    pub fail_lookups: AtomicBool,
    pub fail_balances: AtomicBool,
    pub submitted: Mutex<Vec<OrderIntent>>,
    /// For each submission: was the intent already durable as Submitted?
    pub write_ahead_seen: Mutex<Vec<bool>>,
}

impl ScriptedAccount {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        self.balances
            .lock()
            .unwrap()
            .insert(asset.to_string(), amount);
    }

    pub fn script_submit(&self, submit: Submit) {
        self.submit_script.lock().unwrap().push_back(submit);
    }

    /// Lets submissions check the tracker for the write-ahead record.
    pub fn observe(&self, tracker: &Db) {
        *self.tracker.lock().unwrap() = Some(tracker.clone());
    }

    /// Adds an order to the exchange history, as if a lost submission had landed.
    pub fn add_history(&self, intent: &OrderIntent, client_id: Option<&str>, status: ExchangeOrderStatus) -> String {
        let id = format!("X{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1000);
        self.history.lock().unwrap().push(ExchangeOrder {
            exchange_order_id: id.clone(),
            client_order_id: client_id.map(str::to_string),
            pair: intent.pair.clone(),
            side: intent.side,
            quantity: intent.quantity,
            status,
            created_at: Utc::now(),
        });
        id
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn last_submitted(&self) -> Option<OrderIntent> {
        self.submitted.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AccountGateway for ScriptedAccount {
    fn name(&self) -> &'static str {
        "ScriptedAccount"
    }

    async fn get_balance(&self, asset: &str) -> execution::Result<Balance> {
        if self.fail_balances.load(Ordering::SeqCst) {
            return Err(GatewayError::RateLimited);
        }
        let available = self
            .balances
            .lock()
            .unwrap()
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO);
        Ok(Balance {
            asset: asset.to_string(),
            available,
            locked: Decimal::ZERO,
        })
    }

    async fn submit_order(&self, intent: &OrderIntent) -> execution::Result<String> {
        let tracker = self.tracker.lock().unwrap().clone();
        if let Some(db) = tracker {
            let durable = matches!(
                db.get(&intent.decision_id).await,
                Ok(Some(record)) if record.status() == OrderStatus::Submitted
            );
            self.write_ahead_seen.lock().unwrap().push(durable);
        }
        self.submitted.lock().unwrap().push(intent.clone());

        let next = self.submit_script.lock().unwrap().pop_front().unwrap_or(Submit::Accept);
        match next {
            Submit::Accept => {
                let status = ExchangeOrderStatus::Filled;
                Ok(self.add_history(intent, Some(intent.decision_id.as_str()), status))
            }
            Submit::Reject => Err(GatewayError::Rejected {
                code: -2010,
                msg: "Account has insufficient balance for requested action.".to_string(),
            }),
            Submit::TimeoutError => Err(GatewayError::Timeout),
            Submit::ConnectError => Err(GatewayError::Network("connection refused".to_string())),
            Submit::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GatewayError::Timeout)
            }
        }
    }

    async fn get_order_status(&self, query: &OrderQuery) -> execution::Result<Vec<ExchangeOrder>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("exchange unreachable".to_string()));
        }
        let history = self.history.lock().unwrap();
        Ok(history
            .iter()
            .filter(|o| match query {
                OrderQuery::ByExchangeId {
                    pair,
                    exchange_order_id,
                } => &o.pair == pair && &o.exchange_order_id == exchange_order_id,
                OrderQuery::ByWindow { pair, from, to } => {
                    &o.pair == pair && o.created_at >= *from && o.created_at <= *to
                }
            })
            .cloned()
            .collect())
    }
}

pub fn quick_timeouts() -> TimeoutSettings {
    TimeoutSettings {
        data_fetch_seconds: 1,
        order_submit_seconds: 1,
        balance_seconds: 1,
    }
}

pub fn signal_engine(previous: Option<AveragePair>) -> SignalEngine {
    SignalEngine::new(MACrossoverSettings {
        short_period: 2,
        long_period: 4,
    })
    .unwrap()
    .with_previous(previous)
}

pub fn sizer() -> Arc<dyn PositionSizer> {
    Arc::new(
        RuleBasedSizer::new(SizingSettings {
            rule: SizingRule::FixedFraction {
                fraction: dec!(0.5),
            },
            sell_fraction: dec!(1),
            min_order_notional: dec!(10),
            quantity_scale: 6,
        })
        .unwrap(),
    )
}

pub fn cycle(
    market: &Arc<ScriptedMarket>,
    account: &Arc<ScriptedAccount>,
    tracker: &Db,
    previous: Option<AveragePair>,
) -> DecisionCycle {
    DecisionCycle::new(
        btc(),
        market.clone(),
        account.clone(),
        tracker.clone(),
        signal_engine(previous),
        sizer(),
        quick_timeouts(),
        ChronoDuration::seconds(180),
    )
}

pub fn reconciler(account: &Arc<ScriptedAccount>, tracker: &Db, max_attempts: u32) -> Reconciler {
    Reconciler::new(
        account.clone(),
        tracker.clone(),
        ReconciliationSettings {
            interval_seconds: 300,
            max_reconciliation_attempts: max_attempts,
            match_window_seconds: 600,
        },
        Duration::from_secs(1),
    )
}

pub fn intent_for(window: &PriceWindow, side: Side, quantity: Decimal) -> OrderIntent {
    let pair = btc().symbol;
    OrderIntent {
        decision_id: core_types::DecisionId::for_decision(&pair, window.newest().timestamp, side),
        pair,
        side,
        quantity,
        created_at: Utc::now(),
    }
}
