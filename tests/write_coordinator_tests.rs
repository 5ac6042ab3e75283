/// Write coordinator tests
///
/// Create/update semantics, input validation, integrity rejection and the
/// visibility difference between immediate and batched propagation.
/// Run with: cargo test --test write_coordinator_tests
mod common;

use common::*;
use serde_json::json;
use travelsdb::model::{DISTANCE, EMAIL, FIRST_NAME, GENDER, LOCATIONS, PLACE, USERS, VISITS};
use travelsdb::{DbError, EntityKind, Propagation, WriteTarget};

#[tokio::test]
async fn test_update_existing_user() {
    let service = loaded(Propagation::Batched).await;
    service
        .coordinator()
        .create_or_update(EntityKind::User, WriteTarget::Existing(1), &json!({"email": "new@example.com"}))
        .await
        .unwrap();

    let user = fetch(service.store(), USERS, 1).await;
    assert_eq!(user.get_str(EMAIL).unwrap(), "new@example.com");
    assert_eq!(user.get_str(FIRST_NAME).unwrap(), "Ann");
}

#[tokio::test]
async fn test_create_new_location_with_defaults() {
    let service = loaded(Propagation::Batched).await;
    service
        .coordinator()
        .create_or_update(EntityKind::Location, WriteTarget::New, &json!({"id": 7, "place": "Harbor"}))
        .await
        .unwrap();

    let location = fetch(service.store(), LOCATIONS, 7).await;
    assert_eq!(location.get_str(PLACE).unwrap(), "Harbor");
    assert_eq!(location.get_i64(DISTANCE).unwrap(), 0);
}

#[tokio::test]
async fn test_new_without_id_is_malformed() {
    let service = loaded(Propagation::Batched).await;
    let err = service
        .coordinator()
        .create_or_update(EntityKind::User, WriteTarget::New, &json!({"email": "x@example.com"}))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Malformed(_)));
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let service = loaded(Propagation::Batched).await;
    let err = service
        .coordinator()
        .create_or_update(EntityKind::User, WriteTarget::Existing(999), &json!({"email": "x@example.com"}))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

#[tokio::test]
async fn test_invalid_bodies_are_malformed_and_mutate_nothing() {
    let service = loaded(Propagation::Batched).await;
    let bodies = [
        json!([1, 2, 3]),
        json!({"email": null}),
        json!({"email": "ok@example.com", "nickname": "x"}),
        json!({"email": "ok@example.com", "birth_date": "yesterday"}),
        json!({"email": "ok@example.com", "gender": "x"}),
        json!({"email": "ok@example.com", "birth_date": 1.5}),
    ];

    for body in bodies {
        let err = service
            .coordinator()
            .create_or_update(EntityKind::User, WriteTarget::Existing(1), &body)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Malformed(_)), "{body}: {err:?}");
    }

    let user = fetch(service.store(), USERS, 1).await;
    assert_eq!(user.get_str(EMAIL).unwrap(), "ann@example.com");
    assert_eq!(user.get_str(GENDER).unwrap(), "m");
}

#[tokio::test]
async fn test_mark_out_of_range_is_malformed() {
    let service = loaded(Propagation::Batched).await;
    let err = service
        .coordinator()
        .create_or_update(EntityKind::Visit, WriteTarget::Existing(1), &json!({"mark": 6}))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Malformed(_)));
}

#[tokio::test]
async fn test_path_id_wins_over_body_id() {
    let service = loaded(Propagation::Batched).await;
    service
        .coordinator()
        .create_or_update(EntityKind::User, WriteTarget::Existing(1), &json!({"id": 5, "email": "x@example.com"}))
        .await
        .unwrap();

    assert_eq!(fetch(service.store(), USERS, 1).await.get_str(EMAIL).unwrap(), "x@example.com");
    assert_eq!(service.store().count(USERS).await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_string_leaves_field_unchanged() {
    let service = loaded(Propagation::Batched).await;
    service
        .coordinator()
        .create_or_update(EntityKind::User, WriteTarget::Existing(1), &json!({"first_name": ""}))
        .await
        .unwrap();
    assert_eq!(fetch(service.store(), USERS, 1).await.get_str(FIRST_NAME).unwrap(), "Ann");
}

#[tokio::test]
async fn test_visit_to_unknown_user_is_rejected() {
    let service = loaded(Propagation::Batched).await;
    let before = service.coordinator().activity().last_write();
    let err = service
        .coordinator()
        .create_or_update(
            EntityKind::Visit,
            WriteTarget::New,
            &json!({"id": 10, "user": 999, "location": 1, "visited_at": 5, "mark": 2}),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Integrity(_)));
    assert_eq!(service.store().count(VISITS).await.unwrap(), 3);
    assert_eq!(service.coordinator().activity().last_write(), before);
}

#[tokio::test]
async fn test_stored_write_counts_as_activity_when_cascade_fails() {
    let service = loaded(Propagation::Immediate).await;

    // A visit written straight to the store, bypassing the coordinator.
    let mut orphan = service.store().new_item(VISITS).await.unwrap();
    orphan.set("id", 77i64).unwrap();
    orphan.set("user", 999i64).unwrap();
    orphan.set("location", 1i64).unwrap();
    service.store().upsert(orphan).await.unwrap();

    let activity = service.coordinator().activity();
    assert!(activity.reset_idle_if(activity.last_write().unwrap()));

    let err = service
        .coordinator()
        .create_or_update(EntityKind::Location, WriteTarget::Existing(1), &json!({"distance": 42}))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Integrity(_)));
    let location = fetch(service.store(), LOCATIONS, 1).await;
    assert_eq!(location.get_i64(DISTANCE).unwrap(), 42);
    assert!(activity.last_write().is_some());
}

#[tokio::test]
async fn test_visit_write_denormalizes_immediately() {
    let service = loaded(Propagation::Batched).await;
    service
        .coordinator()
        .create_or_update(
            EntityKind::Visit,
            WriteTarget::Existing(1),
            &json!({"user": 2, "location": 2, "place": "Ignored"}),
        )
        .await
        .unwrap();

    let visit = fetch(service.store(), VISITS, 1).await;
    assert_eq!(visit.get_str(GENDER).unwrap(), "f");
    assert_eq!(visit.get_str(PLACE).unwrap(), "Q");
    assert_eq!(visit.get_i64(DISTANCE).unwrap(), 50);
}

#[tokio::test]
async fn test_immediate_propagation_visible_before_return() {
    let service = loaded(Propagation::Immediate).await;
    service
        .coordinator()
        .create_or_update(EntityKind::Location, WriteTarget::Existing(1), &json!({"distance": 99}))
        .await
        .unwrap();

    assert_eq!(visit_i64(service.store(), 1, DISTANCE).await, 99);
    assert_eq!(visit_i64(service.store(), 2, DISTANCE).await, 99);
    assert_eq!(service.coordinator().activity().pending_len().await, 0);
    assert_shadow_fields_consistent(service.store()).await;
}

#[tokio::test]
async fn test_batched_propagation_waits_for_warmup() {
    let service = loaded(Propagation::Batched).await;
    service
        .coordinator()
        .create_or_update(EntityKind::Location, WriteTarget::Existing(1), &json!({"distance": 99}))
        .await
        .unwrap();

    assert_eq!(visit_i64(service.store(), 1, DISTANCE).await, 5);
    assert_eq!(service.coordinator().activity().pending_len().await, 1);

    let last_write = service.coordinator().activity().last_write().unwrap();
    let scheduler = service.warmup_scheduler();

    assert!(scheduler.tick(last_write + 1_000).await.unwrap().is_none());
    assert_eq!(visit_i64(service.store(), 1, DISTANCE).await, 5);

    let report = scheduler.tick(last_write + 3_001).await.unwrap().unwrap();
    assert_eq!(report.reconciled, 2);
    assert_eq!(visit_i64(service.store(), 1, DISTANCE).await, 99);
    assert_shadow_fields_consistent(service.store()).await;
}
