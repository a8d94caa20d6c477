// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session materialization from a decoded workout.

use crate::db::IngestStore;
use crate::error::AppError;
use crate::models::{CanonicalWorkout, Session, SessionStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Creates permanent sessions from canonical workouts.
#[derive(Clone)]
pub struct SessionMaterializer {
    store: Arc<dyn IngestStore>,
}

impl SessionMaterializer {
    pub fn new(store: Arc<dyn IngestStore>) -> Self {
        Self { store }
    }

    /// Persist a completed session for `workout` and return its ID.
    pub async fn materialize(
        &self,
        workout: &CanonicalWorkout,
        athlete_id: u64,
        ingest_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let session = build_session(
            workout,
            athlete_id,
            ingest_id,
            uuid::Uuid::new_v4().to_string(),
            now,
        );
        self.store.insert_session(&session).await?;

        tracing::info!(
            athlete_id,
            ingest_id,
            session_id = %session.session_id,
            sport = %session.sport,
            duration_min = session.actual_duration_min,
            "Session created"
        );
        Ok(session.session_id)
    }
}

/// Map a workout onto a completed session.
pub fn build_session(
    workout: &CanonicalWorkout,
    athlete_id: u64,
    ingest_id: &str,
    session_id: String,
    now: DateTime<Utc>,
) -> Session {
    Session {
        session_id,
        athlete_id,
        date: workout.date,
        sport: workout.sport,
        title: workout.title.clone(),
        status: SessionStatus::Completed,
        structure: serde_json::Value::Object(serde_json::Map::new()),
        actual_duration_min: workout.duration_minutes,
        actual_distance_m: workout.distance_meters,
        started_at: workout.started_at,
        source_file_type: workout.source_format,
        source_metadata: workout.metadata.clone(),
        source_ingest_id: ingest_id.to_string(),
        created_at: now,
    }
}
