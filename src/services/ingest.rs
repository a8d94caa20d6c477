// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ingestion pipeline.
//!
//! Handles one upload end to end:
//! 1. Validate the upload (no durable work for rejected input)
//! 2. Create the staging record (`received`)
//! 3. Store the raw bytes (`uploaded`)
//! 4. Decode into a canonical workout (`parsed`)
//! 5. Check domain invariants
//! 6. Create the session (`normalized`)
//!
//! Any failure after step 2 ends the record in `error` with the same
//! message the caller receives. Runs are never resumed; the client submits
//! a new upload instead.

use crate::db::IngestStore;
use crate::decoders::{self, DecoderOptions};
use crate::error::{sanitize_message, IngestError};
use crate::models::{IngestStatus, StagingRecord, TransitionError};
use crate::services::session::SessionMaterializer;
use crate::services::storage::{content_path, BlobStore};
use crate::services::upload::{validate_upload, FileUpload};
use crate::services::validation::validate_workout;
use chrono::Utc;
use std::sync::Arc;

/// One upload to ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub athlete_id: u64,
    pub upload: Option<FileUpload>,
    /// Free-text origin supplied by the client
    pub source: Option<String>,
    pub notes: Option<String>,
}

/// Successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub ingest_id: String,
    pub status: IngestStatus,
    pub session_id: String,
}

/// Sequences validation, storage, decoding and session creation.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn IngestStore>,
    blobs: Arc<dyn BlobStore>,
    materializer: SessionMaterializer,
    options: DecoderOptions,
    max_upload_bytes: u64,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn IngestStore>,
        blobs: Arc<dyn BlobStore>,
        options: DecoderOptions,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            materializer: SessionMaterializer::new(store.clone()),
            store,
            blobs,
            options,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Run the pipeline to a terminal state.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, IngestError> {
        let athlete_id = request.athlete_id;

        // 1. Validate before any durable write
        let file_type = match validate_upload(request.upload.as_ref(), self.max_upload_bytes) {
            Ok(file_type) => file_type,
            Err(e) => {
                tracing::warn!(athlete_id, code = e.code(), error = %e, "Upload rejected");
                return Err(e);
            }
        };
        let upload = request.upload.ok_or(IngestError::MissingFile)?;

        // 2. Staging record
        let ingest_id = uuid::Uuid::new_v4().to_string();
        let mut record = StagingRecord::received(
            ingest_id.clone(),
            athlete_id,
            upload.filename.clone(),
            file_type,
            upload.size_bytes,
            Utc::now(),
        );
        record.source = request.source;
        record.notes = request.notes;

        self.store
            .insert_staging(&record)
            .await
            .map_err(|e| IngestError::database(None, e))?;
        log_transition(&record);

        // 3. Raw bytes
        let path = content_path(athlete_id, file_type, &upload.data);
        let stored = match self.blobs.put(&path, &upload.data).await {
            Ok(stored) => stored,
            Err(e) => return Err(self.fail(&mut record, Stage::Upload, e).await),
        };

        let received = record.clone();
        record
            .mark_uploaded(stored.path.clone(), Utc::now())
            .map_err(illegal_transition)?;
        if let Err(e) = self.store.update_staging(&record).await {
            // The record cannot point at the bytes, so they are unreachable.
            if stored.newly_written {
                self.spawn_blob_cleanup(stored.path.clone(), athlete_id, ingest_id.clone());
            }
            let mut record = received;
            let reason = format!("could not record storage location ({})", e);
            return Err(self.fail(&mut record, Stage::Upload, reason).await);
        }
        log_transition(&record);

        // 4. Decode
        let workout = match decoders::decode(file_type, &upload.data, self.options) {
            Ok(workout) => workout,
            Err(e) => return Err(self.fail(&mut record, Stage::Decode, e).await),
        };

        record
            .mark_parsed(workout.clone(), Utc::now())
            .map_err(illegal_transition)?;
        self.persist(&mut record).await?;
        log_transition(&record);

        // 5. Domain checks
        if let Err(e) = validate_workout(&workout, Utc::now()) {
            return Err(self.fail(&mut record, Stage::Validate, e).await);
        }

        // 6. Session
        let session_id = match self
            .materializer
            .materialize(&workout, athlete_id, &ingest_id, Utc::now())
            .await
        {
            Ok(session_id) => session_id,
            Err(e) => return Err(self.fail(&mut record, Stage::Session, e).await),
        };

        record
            .mark_normalized(session_id.clone(), Utc::now())
            .map_err(illegal_transition)?;
        if let Err(e) = self.store.update_staging(&record).await {
            // Session and staging writes are not atomic; the session stands.
            tracing::error!(
                ingest_id = %ingest_id,
                athlete_id,
                session_id = %session_id,
                error = %e,
                "Session created but staging record not finalized"
            );
            return Err(IngestError::database(Some(&ingest_id), e));
        }
        log_transition(&record);

        Ok(IngestOutcome {
            ingest_id,
            status: record.status,
            session_id,
        })
    }

    /// Save an intermediate transition. If the save fails, attempt to end
    /// the record in `error` so it does not stay mid-pipeline.
    async fn persist(&self, record: &mut StagingRecord) -> Result<(), IngestError> {
        let Err(e) = self.store.update_staging(record).await else {
            return Ok(());
        };
        tracing::error!(
            ingest_id = %record.ingest_id,
            status = %record.status,
            error = %e,
            "Failed to save staging record"
        );
        let message = sanitize_message(&format!("Staging update failed: {}", e));
        if record.mark_error(message, Utc::now()).is_ok() {
            if let Err(e) = self.store.update_staging(record).await {
                tracing::error!(ingest_id = %record.ingest_id, error = %e, "Failed to save staging error");
            }
        }
        Err(IngestError::database(Some(&record.ingest_id), e))
    }

    /// End the record in `error` and build the matching caller error.
    async fn fail(
        &self,
        record: &mut StagingRecord,
        stage: Stage,
        reason: impl std::fmt::Display,
    ) -> IngestError {
        let message = sanitize_message(&format!("{}: {}", stage.prefix(), reason));
        let error = stage.error(record.ingest_id.clone(), message.clone());

        match record.mark_error(message, Utc::now()) {
            Ok(()) => {
                if let Err(e) = self.store.update_staging(record).await {
                    tracing::error!(
                        ingest_id = %record.ingest_id,
                        error = %e,
                        "Failed to save staging error"
                    );
                }
            }
            Err(e) => {
                tracing::error!(ingest_id = %record.ingest_id, error = %e, "Cannot mark record failed");
            }
        }

        if error.status_code().is_server_error() {
            tracing::error!(
                ingest_id = %record.ingest_id,
                athlete_id = record.athlete_id,
                status = %record.status,
                code = error.code(),
                error = %error,
                "Ingestion failed"
            );
        } else {
            tracing::warn!(
                ingest_id = %record.ingest_id,
                athlete_id = record.athlete_id,
                status = %record.status,
                code = error.code(),
                error = %error,
                "Ingestion failed"
            );
        }
        error
    }

    /// Delete an unreferenced blob in the background. Failures are logged
    /// and never retried.
    ///
    /// A concurrent upload of the same bytes may already point at the path;
    /// the blob is kept if any record references it or the check fails.
    fn spawn_blob_cleanup(&self, path: String, athlete_id: u64, ingest_id: String) {
        let blobs = self.blobs.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            match store.storage_path_in_use(athlete_id, &path).await {
                Ok(false) => {}
                Ok(true) => {
                    tracing::info!(ingest_id = %ingest_id, path = %path, "Blob shared with another upload; kept");
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        ingest_id = %ingest_id,
                        path = %path,
                        error = %e,
                        "Could not check blob references; kept"
                    );
                    return;
                }
            }
            match blobs.delete(&path).await {
                Ok(()) => tracing::info!(ingest_id = %ingest_id, path = %path, "Removed orphaned blob"),
                Err(e) => tracing::warn!(
                    ingest_id = %ingest_id,
                    path = %path,
                    error = %e,
                    "Orphaned blob cleanup failed"
                ),
            }
        });
    }
}

/// Pipeline step that can end a run.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Upload,
    Decode,
    Validate,
    Session,
}

impl Stage {
    fn prefix(self) -> &'static str {
        match self {
            Stage::Upload => "File upload failed",
            Stage::Decode => "File parsing failed",
            Stage::Validate => "Parse validation failed",
            Stage::Session => "Session creation failed",
        }
    }

    fn error(self, ingest_id: String, message: String) -> IngestError {
        match self {
            Stage::Upload => IngestError::StorageFailed { ingest_id, message },
            Stage::Decode => IngestError::DecodeFailed { ingest_id, message },
            Stage::Validate => IngestError::ValidationFailed { ingest_id, message },
            Stage::Session => IngestError::SessionCreationFailed { ingest_id, message },
        }
    }
}

fn log_transition(record: &StagingRecord) {
    tracing::info!(
        ingest_id = %record.ingest_id,
        athlete_id = record.athlete_id,
        status = %record.status,
        "Staging record updated"
    );
}

fn illegal_transition(e: TransitionError) -> IngestError {
    tracing::error!(error = %e, "Pipeline attempted illegal transition");
    IngestError::database(None, e)
}
