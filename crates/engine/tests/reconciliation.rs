mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use core_types::{ExchangeOrderStatus, OrderOutcome, OrderStatus, Side};
use database::Db;
use engine::ReconcileReport;
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_crash_after_write_ahead_recovers_without_resubmitting() {
    let dir = tempfile::tempdir().unwrap();
    let settings = app_config::types::DatabaseSettings {
        url: format!("sqlite://{}", dir.path().join("tracker.db").display()),
    };
    let market = ScriptedMarket::new();
    let account = ScriptedAccount::new();
    let window = market.window(&rising(), ChronoDuration::zero());
    let intent = intent_for(&window, Side::Buy, dec!(0.5));

    // The process dies right after the write-ahead; the order reached the exchange.
    {
        let db = database::connect(&settings).await.unwrap();
        db.record_intent(&intent).await.unwrap();
        db.close().await;
    }
    account.add_history(
        &intent,
        Some(intent.decision_id.as_str()),
        ExchangeOrderStatus::Filled,
    );

    let db = database::connect(&settings).await.unwrap();
    let reconciler = reconciler(&account, &db, 5);

    assert_eq!(reconciler.recover(&btc().symbol).await.unwrap(), 1);
    assert_eq!(
        db.get(&intent.decision_id).await.unwrap().unwrap().status(),
        OrderStatus::Unknown
    );

    let report = reconciler.reconcile_pair(&btc().symbol).await.unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            resolved: 1,
            pending: 0,
            escalated: 0
        }
    );
    assert_eq!(
        db.get(&intent.decision_id).await.unwrap().unwrap().status(),
        OrderStatus::Confirmed
    );
    assert_eq!(account.submit_count(), 0);
}

#[tokio::test]
async fn test_unmatched_order_escalates_once() {
    let db = Db::connect_in_memory().await.unwrap();
    let market = ScriptedMarket::new();
    let account = ScriptedAccount::new();
    let window = market.window(&rising(), ChronoDuration::zero());
    let intent = intent_for(&window, Side::Buy, dec!(0.5));
    db.record_intent(&intent).await.unwrap();
    db.mark_unknown(&intent.decision_id, Utc::now()).await.unwrap();

    let reconciler = reconciler(&account, &db, 3);

    let mut escalations = 0;
    for _ in 0..5 {
        let report = reconciler.reconcile_pair(&btc().symbol).await.unwrap();
        assert_eq!(report.resolved, 0);
        assert_eq!(report.pending, 1);
        escalations += report.escalated;
    }

    assert_eq!(escalations, 1);
    let record = db.get(&intent.decision_id).await.unwrap().unwrap();
    assert_eq!(record.status(), OrderStatus::Unknown);
    assert_eq!(record.reconciliation_attempts, 5);
    assert!(record.escalated);
    // Still blocking the pair until someone resolves it.
    assert!(db.latest_unresolved(&btc().symbol).await.unwrap().is_some());
}

#[tokio::test]
async fn test_canceled_exchange_order_resolves_failed() {
    let db = Db::connect_in_memory().await.unwrap();
    let market = ScriptedMarket::new();
    let account = ScriptedAccount::new();
    let window = market.window(&falling(), ChronoDuration::zero());
    let intent = intent_for(&window, Side::Sell, dec!(0.25));
    db.record_intent(&intent).await.unwrap();
    db.mark_unknown(&intent.decision_id, Utc::now()).await.unwrap();

    // No client id came back; side and quantity still identify it.
    let exchange_id = account.add_history(&intent, None, ExchangeOrderStatus::Canceled);

    let report = reconciler(&account, &db, 5)
        .reconcile_pair(&btc().symbol)
        .await
        .unwrap();

    assert_eq!(report.resolved, 1);
    let record = db.get(&intent.decision_id).await.unwrap().unwrap();
    assert_eq!(record.status(), OrderStatus::Failed);
    assert_eq!(record.outcome.exchange_order_id, Some(exchange_id));
    assert!(db.latest_unresolved(&btc().symbol).await.unwrap().is_none());
}

#[tokio::test]
async fn test_lookup_error_counts_as_attempt() {
    let db = Db::connect_in_memory().await.unwrap();
    let market = ScriptedMarket::new();
    let account = ScriptedAccount::new();
    let window = market.window(&rising(), ChronoDuration::zero());
    let intent = intent_for(&window, Side::Buy, dec!(0.5));
    db.record_intent(&intent).await.unwrap();
    db.mark_unknown(&intent.decision_id, Utc::now()).await.unwrap();
    account.add_history(
        &intent,
        Some(intent.decision_id.as_str()),
        ExchangeOrderStatus::Filled,
    );
    account.fail_lookups.store(true, Ordering::SeqCst);

    let reconciler = reconciler(&account, &db, 5);
    let report = reconciler.reconcile_pair(&btc().symbol).await.unwrap();
    assert_eq!(report.pending, 1);
    assert_eq!(
        db.get(&intent.decision_id)
            .await
            .unwrap()
            .unwrap()
            .reconciliation_attempts,
        1
    );

    // The exchange comes back; the next pass resolves it.
    account.fail_lookups.store(false, Ordering::SeqCst);
    let report = reconciler.reconcile_pair(&btc().symbol).await.unwrap();
    assert_eq!(report.resolved, 1);
}

#[tokio::test]
async fn test_known_exchange_id_is_queried_directly() {
    let db = Db::connect_in_memory().await.unwrap();
    let market = ScriptedMarket::new();
    let account = ScriptedAccount::new();
    let window = market.window(&rising(), ChronoDuration::zero());
    let intent = intent_for(&window, Side::Buy, dec!(0.5));
    db.record_intent(&intent).await.unwrap();

    // An identical order that is not ours, then ours.
    account.add_history(&intent, None, ExchangeOrderStatus::Canceled);
    let ours = account.add_history(&intent, None, ExchangeOrderStatus::Filled);

    db.update_outcome(&OrderOutcome {
        decision_id: intent.decision_id.clone(),
        exchange_order_id: Some(ours.clone()),
        status: OrderStatus::Unknown,
        last_checked_at: Utc::now(),
    })
    .await
    .unwrap();

    let report = reconciler(&account, &db, 5)
        .reconcile_pair(&btc().symbol)
        .await
        .unwrap();

    assert_eq!(report.resolved, 1);
    let record = db.get(&intent.decision_id).await.unwrap().unwrap();
    assert_eq!(record.status(), OrderStatus::Confirmed);
    assert_eq!(record.outcome.exchange_order_id, Some(ours));
}
