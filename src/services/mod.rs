// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod ingest;
pub mod session;
pub mod status;
pub mod storage;
pub mod upload;
pub mod validation;

pub use ingest::{IngestOutcome, IngestPipeline, IngestRequest};
pub use session::SessionMaterializer;
pub use status::{compute_etag, etag_matches, IngestStatusView};
pub use storage::{BlobStore, LocalBlobStore, MemoryBlobStore, StorageError, StoredBlob};
pub use upload::{validate_upload, FileUpload};
pub use validation::{validate_workout, WorkoutValidationError};
