// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout Ingest: turn uploaded workout files into training sessions.
//!
//! This crate provides the backend API that accepts TCX, GPX and FIT
//! uploads, stores the raw bytes, decodes them into a canonical workout
//! and records a completed session, keeping a per-upload staging record
//! as the audit trail.

pub mod config;
pub mod db;
pub mod decoders;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::IngestStore;
use decoders::DecoderOptions;
use services::{BlobStore, IngestPipeline};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn IngestStore>,
    pub pipeline: IngestPipeline,
}

impl AppState {
    /// Wire the pipeline to the given stores.
    pub fn new(config: Config, store: Arc<dyn IngestStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let pipeline = IngestPipeline::new(
            store.clone(),
            blobs,
            DecoderOptions {
                default_sport: config.default_sport,
            },
            config.max_upload_bytes,
        );
        Self {
            config,
            store,
            pipeline,
        }
    }
}
