// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout Ingest API Server
//!
//! Accepts workout file uploads and turns them into training sessions.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_ingest::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, IngestStore, MemoryDb},
    services::LocalBlobStore,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        max_upload_bytes = config.max_upload_bytes,
        "Starting Workout Ingest API"
    );

    // Record store
    let store: Arc<dyn IngestStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    // Raw file store
    tokio::fs::create_dir_all(&config.upload_root).await?;
    tracing::info!(root = %config.upload_root.display(), "Blob store ready");
    let blobs = Arc::new(LocalBlobStore::new(config.upload_root.clone()));

    let state = Arc::new(AppState::new(config.clone(), store, blobs));

    // Build router
    let app = workout_ingest::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("workout_ingest=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
