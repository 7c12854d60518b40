// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use carbon_ledger::config::Config;
use carbon_ledger::db::{Db, FirestoreDb, MemoryDb};
use carbon_ledger::middleware::auth::create_jwt;
use carbon_ledger::models::NewEntry;
use carbon_ledger::routes::create_router;
use carbon_ledger::services::{CarbonEngine, CatalogService};
use carbon_ledger::AppState;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// The catalog shipped in `data/catalog.json`.
#[allow(dead_code)]
pub fn test_catalog() -> Arc<CatalogService> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/catalog.json");
    Arc::new(CatalogService::load_from_file(path).expect("Failed to load test catalog"))
}

/// Engine over a fresh in-memory store.
#[allow(dead_code)]
pub fn test_engine() -> CarbonEngine {
    CarbonEngine::new(
        Db::Memory(MemoryDb::new()),
        test_catalog(),
        &Config::test_default(),
    )
}

/// Create a test app over the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let engine = CarbonEngine::new(Db::Memory(MemoryDb::new()), test_catalog(), &config);

    let state = Arc::new(AppState { config, engine });

    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn create_test_jwt(owner_id: &str, signing_key: &[u8]) -> String {
    create_jwt(owner_id, signing_key).expect("Failed to create test JWT")
}

#[allow(dead_code)]
pub fn ts(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("valid RFC3339 timestamp")
        .with_timezone(&Utc)
}

#[allow(dead_code)]
pub fn utc() -> FixedOffset {
    Utc.fix()
}

/// Entry input for `quantity` units of `activity_id`, logged at server time.
#[allow(dead_code)]
pub fn new_entry(activity_id: &str, quantity: i64) -> NewEntry {
    NewEntry {
        id: None,
        activity_id: activity_id.to_string(),
        quantity: Decimal::from(quantity),
        logged_at: None,
        note: None,
    }
}
