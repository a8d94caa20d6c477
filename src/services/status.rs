// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public projection of staging records and strong validators over it.

use crate::models::{FileType, IngestStatus, StagingRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Client-facing view of one ingestion attempt.
///
/// Excludes the storage path and parsed snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct IngestStatusView {
    pub ingest_id: String,
    pub filename: String,
    pub file_type: FileType,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub file_size_bytes: u64,
    pub status: IngestStatus,
    pub error_message: Option<String>,
    pub session_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&StagingRecord> for IngestStatusView {
    fn from(record: &StagingRecord) -> Self {
        Self {
            ingest_id: record.ingest_id.clone(),
            filename: record.filename.clone(),
            file_type: record.file_type,
            file_size_bytes: record.file_size_bytes,
            status: record.status,
            error_message: record.error_message.clone(),
            session_id: record.session_id.clone(),
            created_at: format_timestamp(record.created_at),
            updated_at: format_timestamp(record.updated_at),
        }
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Quoted strong ETag for a view: SHA-256 over its JSON with keys sorted.
pub fn compute_etag(view: &IngestStatusView) -> String {
    let canonical = match serde_json::to_value(view) {
        Ok(value) => canonicalize(value),
        Err(e) => {
            // Plain data; serialization cannot fail in practice.
            tracing::error!(error = %e, "Failed to serialize status view");
            serde_json::Value::Null
        }
    };
    let bytes = canonical.to_string();
    format!("\"{}\"", hex::encode(Sha256::digest(bytes.as_bytes())))
}

/// Rebuild objects with keys in sorted order, independent of how
/// `serde_json` orders maps.
fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(canonicalize).collect())
        }
        other => other,
    }
}

/// Whether an `If-None-Match` header value matches `etag`.
///
/// Accepts `*`, a single tag, or a comma-separated list. Weak tags compare
/// by their opaque value.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let wanted = etag.trim_start_matches("W/");
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|tag| tag == "*" || tag.trim_start_matches("W/") == wanted)
}
