// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Longest message stored on a staging record.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Ingestion failures, one variant per client-visible category.
///
/// Variants raised after a staging record exists carry its `ingest_id` so
/// the caller can inspect the audit trail.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No file was provided")]
    MissingFile,

    #[error("File exceeds the upload limit of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("File is empty")]
    EmptyFile,

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Invalid upload metadata: {0}")]
    InvalidMetadata(String),

    #[error("{message}")]
    DecodeFailed { ingest_id: String, message: String },

    #[error("{message}")]
    ValidationFailed { ingest_id: String, message: String },

    #[error("{message}")]
    StorageFailed { ingest_id: String, message: String },

    #[error("{message}")]
    SessionCreationFailed { ingest_id: String, message: String },

    /// `ingest_id` is set once a staging record exists.
    #[error("Database error: {message}")]
    Database {
        ingest_id: Option<String>,
        message: String,
    },
}

impl IngestError {
    pub fn database(ingest_id: Option<&str>, message: impl std::fmt::Display) -> Self {
        IngestError::Database {
            ingest_id: ingest_id.map(str::to_string),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable category.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::MissingFile => "missing_file",
            IngestError::FileTooLarge { .. } => "file_too_large",
            IngestError::EmptyFile => "empty_file",
            IngestError::UnsupportedFileType(_) => "unsupported_file_type",
            IngestError::InvalidMetadata(_) => "invalid_metadata",
            IngestError::DecodeFailed { .. } => "decode_failed",
            IngestError::ValidationFailed { .. } => "validation_failed",
            IngestError::StorageFailed { .. } => "storage_failed",
            IngestError::SessionCreationFailed { .. } => "session_creation_failed",
            IngestError::Database { .. } => "database_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::MissingFile | IngestError::EmptyFile | IngestError::InvalidMetadata(_) => {
                StatusCode::BAD_REQUEST
            }
            IngestError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            IngestError::DecodeFailed { .. } | IngestError::ValidationFailed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            // Infrastructure trouble; the caller may resubmit.
            IngestError::StorageFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            IngestError::SessionCreationFailed { .. } | IngestError::Database { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn ingest_id(&self) -> Option<&str> {
        match self {
            IngestError::DecodeFailed { ingest_id, .. }
            | IngestError::ValidationFailed { ingest_id, .. }
            | IngestError::StorageFailed { ingest_id, .. }
            | IngestError::SessionCreationFailed { ingest_id, .. } => Some(ingest_id),
            IngestError::Database { ingest_id, .. } => ingest_id.as_deref(),
            _ => None,
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingest_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details, ingest_id) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None, None),
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "not_found", Some(msg.clone()), None)
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()), None)
            }
            AppError::Ingest(err) => {
                let status = err.status_code();
                if status.is_server_error() {
                    tracing::error!(error = %err, code = err.code(), "Ingestion failed");
                }
                // Database details stay in the logs.
                let details = match err {
                    IngestError::Database { .. } => None,
                    other => Some(other.to_string()),
                };
                (
                    status,
                    err.code(),
                    details,
                    err.ingest_id().map(str::to_string),
                )
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None, None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            ingest_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Make an error message safe to store and show: control characters
/// removed, whitespace collapsed, length capped.
pub fn sanitize_message(message: &str) -> String {
    let collapsed = message
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(MAX_ERROR_MESSAGE_LEN - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_collapses_whitespace_and_controls() {
        assert_eq!(
            sanitize_message("bad\u{0}\tfile\n\n  here"),
            "bad file here"
        );
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(2000);
        let clean = sanitize_message(&long);
        assert_eq!(clean.chars().count(), MAX_ERROR_MESSAGE_LEN);
        assert!(clean.ends_with("..."));
    }

    #[test]
    fn test_ingest_error_status_codes() {
        let too_large = IngestError::FileTooLarge { size: 30, max: 25 };
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.code(), "file_too_large");

        let unsupported = IngestError::UnsupportedFileType("bin".to_string());
        assert_eq!(unsupported.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let storage = IngestError::StorageFailed {
            ingest_id: "i".to_string(),
            message: "disk".to_string(),
        };
        assert_eq!(storage.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(storage.ingest_id(), Some("i"));
    }

    #[tokio::test]
    async fn test_error_body_includes_ingest_id() {
        let err = AppError::from(IngestError::DecodeFailed {
            ingest_id: "abc".to_string(),
            message: "File parsing failed: not a valid FIT file".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "decode_failed");
        assert_eq!(json["ingest_id"], "abc");
        assert!(json["details"].as_str().unwrap().contains("not a valid"));
    }
}
