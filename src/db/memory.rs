// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process record store for local development and tests.

use crate::db::IngestStore;
use crate::error::AppError;
use crate::models::{Session, StagingRecord};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Record store backed by concurrent hash maps. Clones share data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    staging: Arc<DashMap<String, StagingRecord>>,
    sessions: Arc<DashMap<String, Session>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staging_count(&self) -> usize {
        self.staging.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl IngestStore for MemoryDb {
    async fn insert_staging(&self, record: &StagingRecord) -> Result<(), AppError> {
        match self.staging.entry(record.ingest_id.clone()) {
            Entry::Occupied(_) => Err(AppError::Database(format!(
                "Staging record {} already exists",
                record.ingest_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update_staging(&self, record: &StagingRecord) -> Result<(), AppError> {
        match self.staging.get_mut(&record.ingest_id) {
            Some(mut existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(AppError::Database(format!(
                "Staging record {} does not exist",
                record.ingest_id
            ))),
        }
    }

    async fn get_staging(&self, ingest_id: &str) -> Result<Option<StagingRecord>, AppError> {
        Ok(self.staging.get(ingest_id).map(|r| r.value().clone()))
    }

    async fn list_staging_for_athlete(
        &self,
        athlete_id: u64,
        limit: u32,
    ) -> Result<Vec<StagingRecord>, AppError> {
        let mut records: Vec<StagingRecord> = self
            .staging
            .iter()
            .filter(|r| r.athlete_id == athlete_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.ingest_id.cmp(&a.ingest_id))
        });
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn storage_path_in_use(
        &self,
        athlete_id: u64,
        storage_path: &str,
    ) -> Result<bool, AppError> {
        Ok(self.staging.iter().any(|r| {
            r.athlete_id == athlete_id && r.storage_path.as_deref() == Some(storage_path)
        }))
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AppError> {
        match self.sessions.entry(session.session_id.clone()) {
            Entry::Occupied(_) => Err(AppError::Database(format!(
                "Session {} already exists",
                session.session_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.get(session_id).map(|s| s.value().clone()))
    }
}
