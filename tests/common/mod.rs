#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use travelsdb::consistency::WarmupSettings;
use travelsdb::model::{self, LOCATION_SHADOW_FIELDS, LOCATIONS, USER_SHADOW_FIELDS, USERS, VISITS};
use travelsdb::storage::Cond;
use travelsdb::{EntityStore, InMemoryStore, IntegrityPolicy, Propagation, Query, Record, TravelService};

pub const USERS_JSON: &str = r#"{"users": [
    {"id": 1, "email": "ann@example.com", "first_name": "Ann", "last_name": "Lee", "gender": "m", "birth_date": 100},
    {"id": 2, "email": "bea@example.com", "first_name": "Bea", "last_name": "Kim", "gender": "f", "birth_date": -500000000}
]}"#;

pub const LOCATIONS_JSON: &str = r#"{"locations": [
    {"id": 1, "place": "P", "country": "C", "city": "Town", "distance": 5},
    {"id": 2, "place": "Q", "country": "D", "city": "Village", "distance": 50}
]}"#;

pub const VISITS_JSON: &str = r#"{"visits": [
    {"id": 1, "user": 1, "location": 1, "visited_at": 1000, "mark": 4},
    {"id": 2, "user": 2, "location": 1, "visited_at": 2000, "mark": 3},
    {"id": 3, "user": 1, "location": 2, "visited_at": 1500, "mark": 5}
]}"#;

pub const NOW: i64 = 1_503_333_691;

pub fn write_fixture(dir: &Path) {
    std::fs::write(dir.join("users_1.json"), USERS_JSON).unwrap();
    std::fs::write(dir.join("locations_1.json"), LOCATIONS_JSON).unwrap();
    std::fs::write(dir.join("visits_1.json"), VISITS_JSON).unwrap();
    std::fs::write(dir.join("options.txt"), format!("{}\n1\n", NOW)).unwrap();
}

pub fn fixture_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    dir
}

pub fn service(propagation: Propagation) -> TravelService {
    service_with(propagation, WarmupSettings::default())
}

pub fn service_with(propagation: Propagation, warmup: WarmupSettings) -> TravelService {
    TravelService::with_store(
        Arc::new(InMemoryStore::new()),
        propagation,
        IntegrityPolicy::Reject,
        warmup,
    )
}

/// Service loaded with the fixture data set.
pub async fn loaded(propagation: Propagation) -> TravelService {
    let dir = fixture_dir();
    let mut service = service(propagation);
    service.load(dir.path()).await.unwrap();
    service
}

pub async fn fetch(store: &Arc<dyn EntityStore>, collection: &str, id: i64) -> Arc<Record> {
    let results = store
        .select(&Query::new(collection).filter(model::ID, Cond::Eq, id))
        .await
        .unwrap();
    let item = results
        .single()
        .unwrap_or_else(|| panic!("{collection} {id} should exist exactly once"));
    Arc::clone(&item.record)
}

pub async fn visit_i64(store: &Arc<dyn EntityStore>, id: i64, field: &str) -> i64 {
    fetch(store, VISITS, id).await.get_i64(field).unwrap()
}

/// Every visit's shadow fields match its user and location.
pub async fn assert_shadow_fields_consistent(store: &Arc<dyn EntityStore>) {
    let visits = store.select(&Query::new(VISITS)).await.unwrap();
    for visit in visits.records() {
        let user = fetch(store, USERS, visit.get_i64(model::USER).unwrap()).await;
        let location = fetch(store, LOCATIONS, visit.get_i64(model::LOCATION).unwrap()).await;

        for name in USER_SHADOW_FIELDS {
            assert_eq!(
                visit.get(name).unwrap(),
                user.get(name).unwrap(),
                "visit {} field {}",
                visit.id().unwrap(),
                name
            );
        }
        for name in LOCATION_SHADOW_FIELDS {
            assert_eq!(
                visit.get(name).unwrap(),
                location.get(name).unwrap(),
                "visit {} field {}",
                visit.id().unwrap(),
                name
            );
        }
    }
}
