// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Carbon Ledger API Server
//!
//! Records activities with their carbon-equivalent impact and tracks
//! challenge and badge progress derived from the ledger.

use carbon_ledger::{
    config::{Config, StorageBackend},
    db::{Db, FirestoreDb, MemoryDb},
    services::{spawn_expiry_sweeper, CarbonEngine, CatalogService},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Carbon Ledger API");

    // Initialize storage
    let db = match config.storage_backend {
        StorageBackend::Firestore => Db::Firestore(FirestoreDb::new(&config.gcp_project_id).await?),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Db::Memory(MemoryDb::new())
        }
    };

    // Load activity catalog
    tracing::info!(path = %config.catalog_path, "Loading activity catalog");
    let catalog = Arc::new(CatalogService::load_from_file(&config.catalog_path)?);

    let engine = CarbonEngine::new(db, catalog, &config);

    // Periodically expire challenges whose window closed short of target
    let sweep_period = Duration::from_secs(config.expiry_sweep_interval_secs.max(1));
    spawn_expiry_sweeper(engine.clone(), sweep_period);
    tracing::info!(
        interval_secs = sweep_period.as_secs(),
        "Challenge expiry sweeper started"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
    });

    // Build router
    let app = carbon_ledger::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carbon_ledger=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
