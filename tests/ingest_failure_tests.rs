// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Infrastructure failures during ingestion.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{
    create_app_with, fixture, json_body, upload, FailingBlobStore, FlakyStore, ATHLETE_ID,
};
use std::sync::Arc;
use std::time::Duration;
use workout_ingest::db::{IngestStore, MemoryDb};
use workout_ingest::models::{FileType, IngestStatus, StagingRecord};
use workout_ingest::services::storage::content_path;
use workout_ingest::services::MemoryBlobStore;

#[tokio::test]
async fn test_storage_failure_is_retryable_and_recorded() {
    let db = MemoryDb::new();
    let (router, _) = create_app_with(Arc::new(db.clone()), Arc::new(FailingBlobStore));

    let response = upload(&router, "ride.gpx", &fixture("evening_ride.gpx")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = json_body(response).await;
    assert_eq!(json["error"], "storage_failed");
    let details = json["details"].as_str().unwrap();
    assert!(details.starts_with("File upload failed:"), "{}", details);

    let record = db
        .get_staging(json["ingest_id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, IngestStatus::Error);
    assert!(record.storage_path.is_none());
    assert_eq!(db.session_count(), 0);
}

#[tokio::test]
async fn test_session_failure_leaves_bytes_and_error_record() {
    let db = MemoryDb::new();
    let blobs = MemoryBlobStore::new();
    let store = FlakyStore::failing_sessions(db.clone());
    let (router, _) = create_app_with(Arc::new(store), Arc::new(blobs.clone()));

    let response = upload(&router, "run.tcx", &fixture("progression_run.tcx")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = json_body(response).await;
    assert_eq!(json["error"], "session_creation_failed");
    assert!(json["details"]
        .as_str()
        .unwrap()
        .starts_with("Session creation failed:"));

    let record = db
        .get_staging(json["ingest_id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, IngestStatus::Error);
    assert!(record.session_id.is_none());
    assert!(record.parsed_snapshot.is_some());
    // Orphaned bytes are kept as the audit trail.
    assert!(blobs.contains(record.storage_path.as_deref().unwrap()));
    assert_eq!(db.session_count(), 0);
}

#[tokio::test]
async fn test_unrecorded_upload_is_cleaned_up() {
    let db = MemoryDb::new();
    let blobs = MemoryBlobStore::new();
    // The first update is the move to `uploaded`.
    let store = FlakyStore::failing_update(db.clone(), 1);
    let (router, _) = create_app_with(Arc::new(store), Arc::new(blobs.clone()));

    let response = upload(&router, "ride.gpx", &fixture("evening_ride.gpx")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = json_body(response).await;
    let record = db
        .get_staging(json["ingest_id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, IngestStatus::Error);
    assert!(record.storage_path.is_none());

    // Cleanup runs in the background.
    for _ in 0..50 {
        if blobs.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(blobs.is_empty());
}

#[tokio::test]
async fn test_shared_blob_is_not_cleaned_up() {
    let db = MemoryDb::new();
    let blobs = MemoryBlobStore::new();
    let data = fixture("evening_ride.gpx");

    // First upload stores the bytes normally.
    let (router, _) = create_app_with(Arc::new(db.clone()), Arc::new(blobs.clone()));
    assert_eq!(
        upload(&router, "ride.gpx", &data).await.status(),
        StatusCode::CREATED
    );

    // Second upload of the same bytes cannot record its path.
    let store = FlakyStore::failing_update(db.clone(), 1);
    let (router, _) = create_app_with(Arc::new(store), Arc::new(blobs.clone()));
    assert_eq!(
        upload(&router, "ride.gpx", &data).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(blobs.len(), 1);
}

#[tokio::test]
async fn test_concurrently_referenced_blob_is_kept() {
    let db = MemoryDb::new();
    let blobs = MemoryBlobStore::new();
    let data = fixture("evening_ride.gpx");

    // Another upload of the same bytes has already recorded the path while
    // this run is the one that wrote them.
    let path = content_path(ATHLETE_ID, FileType::Gpx, &data);
    let now = Utc::now();
    let mut other = StagingRecord::received(
        "concurrent-upload".to_string(),
        ATHLETE_ID,
        "ride.gpx".to_string(),
        FileType::Gpx,
        data.len() as u64,
        now,
    );
    other.mark_uploaded(path.clone(), now).unwrap();
    db.insert_staging(&other).await.unwrap();

    let store = FlakyStore::failing_update(db.clone(), 1);
    let (router, _) = create_app_with(Arc::new(store), Arc::new(blobs.clone()));
    assert_eq!(
        upload(&router, "ride.gpx", &data).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(blobs.contains(&path));
}

#[tokio::test]
async fn test_failed_parsed_save_reports_ingest_id() {
    let db = MemoryDb::new();
    let blobs = MemoryBlobStore::new();
    // Update 1 records `uploaded`; update 2 is the move to `parsed`.
    let store = FlakyStore::failing_update(db.clone(), 2);
    let (router, _) = create_app_with(Arc::new(store), Arc::new(blobs.clone()));

    let response = upload(&router, "ride.gpx", &fixture("evening_ride.gpx")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = json_body(response).await;
    assert_eq!(json["error"], "database_error");
    assert!(json.get("details").is_none());
    let record = db
        .get_staging(json["ingest_id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, IngestStatus::Error);
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Staging update failed:"));
    assert_eq!(db.session_count(), 0);
}
