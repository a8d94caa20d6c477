// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-upload staging record and its lifecycle state machine.
//!
//! ```text
//! received → uploaded → parsed → normalized
//!     └──────────┴─────────┴──→ error
//! ```
//!
//! `normalized` and `error` are terminal; a terminal record is never
//! modified again.

use crate::models::workout::{CanonicalWorkout, FileType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Lifecycle status of one ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum IngestStatus {
    Received,
    Uploaded,
    Parsed,
    Normalized,
    Error,
}

impl IngestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestStatus::Normalized | IngestStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Received => "received",
            IngestStatus::Uploaded => "uploaded",
            IngestStatus::Parsed => "parsed",
            IngestStatus::Normalized => "normalized",
            IngestStatus::Error => "error",
        }
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: IngestStatus,
    pub to: IngestStatus,
}

/// Audit row tracking one upload from intake to its terminal outcome.
///
/// Invariants maintained by the transition methods:
/// - `session_id` is set iff `status == Normalized`
/// - `error_message` is set iff `status == Error`
/// - `storage_path` is set for every status except `Received`
///   (an upload that fails before its bytes are stored keeps it unset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRecord {
    /// Unique per attempt (also used as document ID)
    pub ingest_id: String,
    /// Owning athlete
    pub athlete_id: u64,
    pub filename: String,
    pub file_type: FileType,
    pub file_size_bytes: u64,
    pub status: IngestStatus,
    pub error_message: Option<String>,
    pub storage_path: Option<String>,
    /// Decoded workout kept for audit/debugging
    pub parsed_snapshot: Option<CanonicalWorkout>,
    pub session_id: Option<String>,
    /// Free-text upload source supplied by the client (not interpreted)
    pub source: Option<String>,
    /// Free-text notes supplied by the client (not interpreted)
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StagingRecord {
    /// Create a fresh record in the `received` state.
    pub fn received(
        ingest_id: String,
        athlete_id: u64,
        filename: String,
        file_type: FileType,
        file_size_bytes: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            ingest_id,
            athlete_id,
            filename,
            file_type,
            file_size_bytes,
            status: IngestStatus::Received,
            error_message: None,
            storage_path: None,
            parsed_snapshot: None,
            session_id: None,
            source: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Raw bytes are durable at `storage_path`.
    pub fn mark_uploaded(
        &mut self,
        storage_path: String,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(IngestStatus::Received, IngestStatus::Uploaded, now)?;
        self.storage_path = Some(storage_path);
        Ok(())
    }

    /// The file decoded into `snapshot`.
    pub fn mark_parsed(
        &mut self,
        snapshot: CanonicalWorkout,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(IngestStatus::Uploaded, IngestStatus::Parsed, now)?;
        self.parsed_snapshot = Some(snapshot);
        Ok(())
    }

    /// A session was materialized from the snapshot.
    pub fn mark_normalized(
        &mut self,
        session_id: String,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(IngestStatus::Parsed, IngestStatus::Normalized, now)?;
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Terminate the run with a failure message.
    pub fn mark_error(
        &mut self,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                from: self.status,
                to: IngestStatus::Error,
            });
        }
        self.status = IngestStatus::Error;
        self.error_message = Some(message.into());
        self.touch(now);
        Ok(())
    }

    fn advance(
        &mut self,
        expected: IngestStatus,
        next: IngestStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch(now);
        Ok(())
    }

    // Clock skew must never move updated_at backwards.
    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workout::{FormatDetails, Sport};
    use chrono::{Duration, NaiveDate};

    fn record(now: DateTime<Utc>) -> StagingRecord {
        StagingRecord::received(
            "ing-1".to_string(),
            7,
            "morning.tcx".to_string(),
            FileType::Tcx,
            5_000,
            now,
        )
    }

    fn workout() -> CanonicalWorkout {
        CanonicalWorkout {
            sport: Sport::Run,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            started_at: None,
            title: None,
            duration_minutes: 42.0,
            distance_meters: Some(8000.0),
            source_format: FileType::Tcx,
            metadata: FormatDetails::Tcx {
                activity_count: 1,
                lap_count: 1,
                trackpoint_count: 0,
                device_name: None,
            },
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let t0 = Utc::now();
        let mut rec = record(t0);
        assert_eq!(rec.status, IngestStatus::Received);
        assert!(rec.storage_path.is_none());

        rec.mark_uploaded("uploads/7/abc.tcx".to_string(), t0 + Duration::seconds(1))
            .unwrap();
        rec.mark_parsed(workout(), t0 + Duration::seconds(2)).unwrap();
        rec.mark_normalized("sess-1".to_string(), t0 + Duration::seconds(3))
            .unwrap();

        assert_eq!(rec.status, IngestStatus::Normalized);
        assert_eq!(rec.session_id.as_deref(), Some("sess-1"));
        assert!(rec.error_message.is_none());
        assert_eq!(rec.updated_at, t0 + Duration::seconds(3));
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut rec = record(Utc::now());
        let err = rec.mark_parsed(workout(), Utc::now()).unwrap_err();
        assert_eq!(err.from, IngestStatus::Received);
        assert_eq!(err.to, IngestStatus::Parsed);
        assert_eq!(rec.status, IngestStatus::Received);
    }

    #[test]
    fn test_error_reachable_from_non_terminal_states() {
        let now = Utc::now();
        let mut rec = record(now);
        rec.mark_error("File upload failed: disk full", now).unwrap();
        assert_eq!(rec.status, IngestStatus::Error);
        assert!(rec.session_id.is_none());

        let mut rec = record(now);
        rec.mark_uploaded("p".to_string(), now).unwrap();
        rec.mark_error("decode", now).unwrap();
        assert_eq!(rec.storage_path.as_deref(), Some("p"));
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let now = Utc::now();
        let mut rec = record(now);
        rec.mark_error("first", now).unwrap();
        assert!(rec.mark_error("second", now).is_err());
        assert!(rec.mark_uploaded("p".to_string(), now).is_err());
        assert_eq!(rec.error_message.as_deref(), Some("first"));
    }

    #[test]
    fn test_updated_at_never_moves_backwards() {
        let now = Utc::now();
        let mut rec = record(now);
        rec.mark_uploaded("p".to_string(), now - Duration::seconds(30))
            .unwrap();
        assert_eq!(rec.updated_at, now);
    }
}
