/// Warmup scheduler tests
///
/// Quiescence detection, reconciliation passes, idle reset and shutdown of
/// the background task.
/// Run with: cargo test --test warmup_tests
mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;
use travelsdb::consistency::WarmupSettings;
use travelsdb::model::{GENDER, VISITS};
use travelsdb::{EntityKind, Propagation, WriteTarget};

#[tokio::test]
async fn test_idle_tick_does_nothing() {
    let service = service(Propagation::Batched);
    service.declare().await.unwrap();
    let scheduler = service.warmup_scheduler();
    assert!(scheduler.tick(u64::MAX).await.unwrap().is_none());
}

#[tokio::test]
async fn test_load_schedules_first_pass() {
    let service = loaded(Propagation::Batched).await;
    let activity = service.coordinator().activity();
    let loaded_at = activity.last_write().expect("load counts as a write");
    let scheduler = service.warmup_scheduler();

    assert!(scheduler.tick(loaded_at + 3_000).await.unwrap().is_none());

    let report = scheduler.tick(loaded_at + 3_001).await.unwrap().unwrap();
    assert_eq!(report.reconciled, 0);
    assert_eq!(report.primed, 1);
    assert!(report.reset);

    assert!(scheduler.tick(u64::MAX).await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_during_pass_keeps_next_pass_scheduled() {
    let service = loaded(Propagation::Batched).await;
    let activity = service.coordinator().activity();
    let observed = activity.last_write().unwrap();
    let scheduler = service.warmup_scheduler();

    activity.touch(observed + 1);
    let report = scheduler.run_pass(observed).await.unwrap();
    assert!(!report.reset);
    assert_eq!(activity.last_write(), Some(observed + 1));

    assert!(scheduler.tick(observed + 1 + 3_000).await.unwrap().is_none());
    let report = scheduler.tick(observed + 1 + 3_001).await.unwrap().unwrap();
    assert!(report.reset);
    assert_eq!(activity.last_write(), None);
}

#[tokio::test]
async fn test_pass_runs_once_after_quiescence() {
    let service = loaded(Propagation::Batched).await;
    service
        .coordinator()
        .create_or_update(EntityKind::User, WriteTarget::Existing(1), &json!({"gender": "f"}))
        .await
        .unwrap();

    let activity = service.coordinator().activity();
    let last_write = activity.last_write().unwrap();
    let scheduler = service.warmup_scheduler();

    assert!(scheduler.tick(last_write + 3_000).await.unwrap().is_none());

    let report = scheduler.tick(last_write + 3_001).await.unwrap().unwrap();
    assert_eq!(report.reconciled, 2);
    assert_eq!(report.primed, 1);
    assert!(report.reset);
    assert_eq!(activity.last_write(), None);
    assert_eq!(activity.pending_len().await, 0);

    let visit = fetch(service.store(), VISITS, 3).await;
    assert_eq!(visit.get_str(GENDER).unwrap(), "f");

    assert!(scheduler.tick(last_write + 10_000).await.unwrap().is_none());
}

#[tokio::test]
async fn test_immediate_mode_only_primes() {
    let service = loaded(Propagation::Immediate).await;
    service
        .coordinator()
        .create_or_update(EntityKind::Location, WriteTarget::Existing(2), &json!({"distance": 1}))
        .await
        .unwrap();

    let last_write = service.coordinator().activity().last_write().unwrap();
    let report = service
        .warmup_scheduler()
        .tick(last_write + 5_000)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.reconciled, 0);
    assert_eq!(report.primed, 1);
    assert!(report.reset);
}

#[tokio::test]
async fn test_spawned_scheduler_reconciles_and_stops() {
    let dir = fixture_dir();
    let mut service = service_with(
        Propagation::Batched,
        WarmupSettings {
            period: Duration::from_millis(10),
            quiescence: Duration::from_millis(20),
        },
    );
    service.load(dir.path()).await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = service.spawn_warmup(shutdown_rx);

    service
        .coordinator()
        .create_or_update(EntityKind::User, WriteTarget::Existing(2), &json!({"gender": "m"}))
        .await
        .unwrap();

    let reconciled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if fetch(service.store(), VISITS, 2).await.get_str(GENDER).unwrap() == "m" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reconciled.is_ok(), "visit 2 was never reconciled");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();
}

#[tokio::test]
async fn test_scheduler_stops_when_sender_dropped() {
    let service = service(Propagation::Batched);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = service.spawn_warmup(shutdown_rx);

    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();
}
