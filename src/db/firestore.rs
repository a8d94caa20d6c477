// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides single-document operations for:
//! - Staging records (one per upload attempt)
//! - Sessions (created from successfully decoded uploads)

use crate::db::{collections, IngestStore};
use crate::error::AppError;
use crate::models::{Session, StagingRecord};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

#[async_trait]
impl IngestStore for FirestoreDb {
    // ─── Staging Record Operations ───────────────────────────────

    async fn insert_staging(&self, record: &StagingRecord) -> Result<(), AppError> {
        let _: StagingRecord = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::INGEST_STAGING)
            .document_id(&record.ingest_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_staging(&self, record: &StagingRecord) -> Result<(), AppError> {
        let _: StagingRecord = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::INGEST_STAGING)
            .document_id(&record.ingest_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_staging(&self, ingest_id: &str) -> Result<Option<StagingRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::INGEST_STAGING)
            .obj()
            .one(ingest_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_staging_for_athlete(
        &self,
        athlete_id: u64,
        limit: u32,
    ) -> Result<Vec<StagingRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::INGEST_STAGING)
            .filter(move |q| q.field("athlete_id").eq(athlete_id))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn storage_path_in_use(
        &self,
        athlete_id: u64,
        storage_path: &str,
    ) -> Result<bool, AppError> {
        let found: Vec<StagingRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::INGEST_STAGING)
            .filter(|q| {
                q.for_all([
                    q.field("athlete_id").eq(athlete_id),
                    q.field("storage_path").eq(storage_path),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(!found.is_empty())
    }

    // ─── Session Operations ──────────────────────────────────────

    async fn insert_session(&self, session: &Session) -> Result<(), AppError> {
        let _: Session = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::SESSIONS)
            .document_id(&session.session_id)
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(session_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_mode_fails_with_database_error() {
        let db = FirestoreDb::new_mock();
        let err = db.get_staging("missing").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
