// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use workout_ingest::config::Config;
use workout_ingest::db::{IngestStore, MemoryDb};
use workout_ingest::error::AppError;
use workout_ingest::middleware::create_jwt;
use workout_ingest::models::{Session, StagingRecord};
use workout_ingest::routes::create_router;
use workout_ingest::services::{BlobStore, MemoryBlobStore, StorageError, StoredBlob};
use workout_ingest::AppState;

pub const ATHLETE_ID: u64 = 12345;
const BOUNDARY: &str = "workout-ingest-test-boundary";

/// Router plus handles on the in-memory stores behind it.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
    pub blobs: MemoryBlobStore,
}

/// Create a test app backed by in-memory stores.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let db = MemoryDb::new();
    let blobs = MemoryBlobStore::new();
    let (router, state) = create_app_with(Arc::new(db.clone()), Arc::new(blobs.clone()));
    TestApp {
        router,
        state,
        db,
        blobs,
    }
}

/// Create a test app over arbitrary stores.
#[allow(dead_code)]
pub fn create_app_with(
    store: Arc<dyn IngestStore>,
    blobs: Arc<dyn BlobStore>,
) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::test_default(), store, blobs));
    (create_router(state.clone()), state)
}

/// Bearer token for `athlete_id` signed with the test key.
#[allow(dead_code)]
pub fn bearer(athlete_id: u64) -> String {
    let token = create_jwt(athlete_id, &Config::test_default().jwt_signing_key)
        .expect("Failed to create JWT");
    format!("Bearer {}", token)
}

/// Read a checked-in fixture.
#[allow(dead_code)]
pub fn fixture(name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("fixture {}: {}", path.display(), e))
}

/// One multipart form part.
#[allow(dead_code)]
pub enum Part<'a> {
    File {
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

/// Encode a `multipart/form-data` body.
#[allow(dead_code)]
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                        name, value
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// POST /api/ingest with the given parts as `athlete_id`.
#[allow(dead_code)]
pub fn ingest_request(athlete_id: u64, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/ingest")
        .header(header::AUTHORIZATION, bearer(athlete_id))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Upload a single file and return the response.
#[allow(dead_code)]
pub async fn upload(router: &Router, filename: &str, data: &[u8]) -> Response<Body> {
    router
        .clone()
        .oneshot(ingest_request(
            ATHLETE_ID,
            &[Part::File {
                filename,
                content_type: "application/octet-stream",
                data,
            }],
        ))
        .await
        .unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ─── Failure injection ───────────────────────────────────────

/// Blob store that rejects every write.
#[allow(dead_code)]
pub struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, _path: &str, _bytes: &[u8]) -> Result<StoredBlob, StorageError> {
        Err(StorageError::Unavailable("bucket offline".to_string()))
    }

    async fn delete(&self, _path: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Record store that fails selected operations and delegates the rest.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryDb,
    pub fail_session_insert: bool,
    /// Fail the N-th `update_staging` call (1-based); 0 disables
    pub fail_update_number: usize,
    updates: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn failing_sessions(inner: MemoryDb) -> Self {
        Self {
            inner,
            fail_session_insert: true,
            ..Default::default()
        }
    }

    pub fn failing_update(inner: MemoryDb, number: usize) -> Self {
        Self {
            inner,
            fail_update_number: number,
            ..Default::default()
        }
    }
}

#[async_trait]
impl IngestStore for FlakyStore {
    async fn insert_staging(&self, record: &StagingRecord) -> Result<(), AppError> {
        self.inner.insert_staging(record).await
    }

    async fn update_staging(&self, record: &StagingRecord) -> Result<(), AppError> {
        let n = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_update_number {
            return Err(AppError::Database("write conflict".to_string()));
        }
        self.inner.update_staging(record).await
    }

    async fn get_staging(&self, ingest_id: &str) -> Result<Option<StagingRecord>, AppError> {
        self.inner.get_staging(ingest_id).await
    }

    async fn list_staging_for_athlete(
        &self,
        athlete_id: u64,
        limit: u32,
    ) -> Result<Vec<StagingRecord>, AppError> {
        self.inner.list_staging_for_athlete(athlete_id, limit).await
    }

    async fn storage_path_in_use(
        &self,
        athlete_id: u64,
        storage_path: &str,
    ) -> Result<bool, AppError> {
        self.inner.storage_path_in_use(athlete_id, storage_path).await
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AppError> {
        if self.fail_session_insert {
            return Err(AppError::Database("sessions table locked".to_string()));
        }
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        self.inner.get_session(session_id).await
    }
}
