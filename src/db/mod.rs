// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record store for staging records and sessions.
//!
//! Row-level isolation between athletes is the store's concern; callers
//! still check ownership before exposing a record.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Session, StagingRecord};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// Per-upload staging records (keyed by ingest_id)
    pub const INGEST_STAGING: &str = "ingest_staging";
    /// Training sessions (keyed by session_id)
    pub const SESSIONS: &str = "sessions";
}

/// Single-row operations the ingestion pipeline needs.
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Insert a new staging record; fails if the ingest ID already exists.
    async fn insert_staging(&self, record: &StagingRecord) -> Result<(), AppError>;

    /// Overwrite an existing staging record.
    async fn update_staging(&self, record: &StagingRecord) -> Result<(), AppError>;

    async fn get_staging(&self, ingest_id: &str) -> Result<Option<StagingRecord>, AppError>;

    /// Most recent staging records for an athlete, newest first.
    async fn list_staging_for_athlete(
        &self,
        athlete_id: u64,
        limit: u32,
    ) -> Result<Vec<StagingRecord>, AppError>;

    /// Whether any of the athlete's staging records points at `storage_path`.
    async fn storage_path_in_use(
        &self,
        athlete_id: u64,
        storage_path: &str,
    ) -> Result<bool, AppError>;

    /// Insert a new session; fails if the session ID already exists.
    async fn insert_session(&self, session: &Session) -> Result<(), AppError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError>;
}
