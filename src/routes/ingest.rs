// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ingestion routes (require authentication via JWT).

use crate::error::{AppError, IngestError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::IngestStatus;
use crate::services::{compute_etag, etag_matches, FileUpload, IngestRequest, IngestStatusView};
use crate::AppState;
use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

/// Headroom above the file cap for multipart framing and text fields.
const BODY_LIMIT_SLACK: u64 = 1024 * 1024;

/// Ingestion routes. The auth middleware is applied in routes/mod.rs.
pub fn routes(max_upload_bytes: u64) -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(max_upload_bytes.saturating_add(BODY_LIMIT_SLACK))
        .unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/api/ingest",
            get(list_ingests)
                .post(create_ingest)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/ingest/{ingest_id}", get(get_ingest_status))
}

// ─── Intake ──────────────────────────────────────────────────

/// Free-text fields accompanying an upload.
#[derive(Debug, Default, Validate)]
struct UploadMetadata {
    #[validate(length(max = 64))]
    source: Option<String>,
    #[validate(length(max = 2000))]
    notes: Option<String>,
}

/// Successful ingestion response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct IngestResponse {
    pub ingest_id: String,
    pub status: IngestStatus,
    pub session_id: String,
}

/// Accept a workout file and run it through the pipeline.
async fn create_ingest(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let max_bytes = state.pipeline.max_upload_bytes();
    let mut upload: Option<FileUpload> = None;
    let mut metadata = UploadMetadata::default();

    let body_error = |e| multipart_error(e, max_bytes);

    while let Some(field) = multipart.next_field().await.map_err(body_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") if upload.is_none() => {
                let file = read_file_field(field, max_bytes).await?;
                let over_cap = file.size_bytes > max_bytes;
                upload = Some(file);
                if over_cap {
                    // Stop reading; the pipeline reports the size.
                    break;
                }
            }
            Some("source") => {
                metadata.source = non_empty(field.text().await.map_err(body_error)?);
            }
            Some("notes") => {
                metadata.notes = non_empty(field.text().await.map_err(body_error)?);
            }
            _ => {}
        }
    }

    metadata
        .validate()
        .map_err(|e| IngestError::InvalidMetadata(e.to_string()))?;

    let outcome = state
        .pipeline
        .ingest(IngestRequest {
            athlete_id: user.athlete_id,
            upload,
            source: metadata.source,
            notes: metadata.notes,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            ingest_id: outcome.ingest_id,
            status: outcome.status,
            session_id: outcome.session_id,
        }),
    ))
}

/// Stream a file field, stopping once it exceeds `max_bytes`.
async fn read_file_field(mut field: Field<'_>, max_bytes: u64) -> Result<FileUpload> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);

    let mut data = Vec::new();
    let mut total: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        total = total.saturating_add(chunk.len() as u64);
        if total > max_bytes {
            break;
        }
        data.extend_from_slice(&chunk);
    }

    let mut upload = FileUpload::new(&filename, content_type, data);
    upload.size_bytes = total;
    Ok(upload)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn multipart_error(e: axum::extract::multipart::MultipartError, max_bytes: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        // Body limit hit before the field total could be counted.
        return IngestError::FileTooLarge {
            size: max_bytes.saturating_add(BODY_LIMIT_SLACK),
            max: max_bytes,
        }
        .into();
    }
    AppError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
}

// ─── Status ──────────────────────────────────────────────────

/// Current state of one ingestion, with conditional-read support.
async fn get_ingest_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ingest_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let record = state
        .store
        .get_staging(&ingest_id)
        .await?
        .filter(|r| r.athlete_id == user.athlete_id)
        .ok_or_else(|| AppError::NotFound(format!("Ingest {} not found", ingest_id)))?;

    let view = IngestStatusView::from(&record);
    let etag = compute_etag(&view);

    let unchanged = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| etag_matches(v, &etag));

    let mut response = if unchanged {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        Json(view).into_response()
    };
    put_cache_headers(response.headers_mut(), &etag);
    Ok(response)
}

fn put_cache_headers(headers: &mut HeaderMap, etag: &str) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, no-cache"),
    );
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<u32>,
}

/// Recent ingestions for the current athlete.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct IngestListResponse {
    pub ingests: Vec<IngestStatusView>,
}

async fn list_ingests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<IngestListResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let records = state
        .store
        .list_staging_for_athlete(user.athlete_id, limit)
        .await?;

    Ok(Json(IngestListResponse {
        ingests: records.iter().map(IngestStatusView::from).collect(),
    }))
}
