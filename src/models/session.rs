// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training session record created from an uploaded workout.

use crate::models::workout::{FileType, FormatDetails, Sport};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle as seen by the session subsystem.
///
/// Uploaded workouts are always `completed`; planned sessions are created
/// elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Planned,
    Completed,
    Skipped,
}

/// Permanent training session (stored in Firestore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (also used as document ID)
    pub session_id: String,
    /// Owning athlete
    pub athlete_id: u64,
    pub date: NaiveDate,
    pub sport: Sport,
    pub title: Option<String>,
    pub status: SessionStatus,
    /// Planned workout structure; empty for uploaded files
    pub structure: serde_json::Value,
    pub actual_duration_min: f64,
    pub actual_distance_m: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    /// Format of the file that produced this session
    pub source_file_type: FileType,
    /// Decoder facts about the source file (device, lap count, ...)
    pub source_metadata: FormatDetails,
    /// Staging record that produced this session
    pub source_ingest_id: String,
    pub created_at: DateTime<Utc>,
}
