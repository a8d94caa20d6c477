// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable storage for raw uploaded files.
//!
//! Files are stored at content-addressed paths
//! (`uploads/<athlete_id>/<sha256>.<ext>`) and are never rewritten with
//! different content.

use crate::models::FileType;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Blob store failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage path {0:?}")]
    InvalidPath(String),

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: String,
    /// False when identical content was already present at `path`
    pub newly_written: bool,
}

/// Key/value store for raw file bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<StoredBlob, StorageError>;

    /// Remove a blob. Used only for best-effort cleanup.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Content-addressed storage path for an athlete's upload.
pub fn content_path(athlete_id: u64, file_type: FileType, bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    format!("uploads/{}/{}.{}", athlete_id, digest, file_type.as_str())
}

/// Reject absolute paths and parent-directory traversal.
fn check_relative(path: &str) -> Result<&Path, StorageError> {
    let candidate = Path::new(path);
    let mut has_file = false;
    for component in candidate.components() {
        match component {
            Component::Normal(_) => has_file = true,
            Component::CurDir => {}
            _ => return Err(StorageError::InvalidPath(path.to_string())),
        }
    }
    if !has_file {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(candidate)
}

// ─── Local filesystem ────────────────────────────────────────

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(check_relative(path)?))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<StoredBlob, StorageError> {
        let target = self.resolve(path)?;
        let io_err = |source| StorageError::Io {
            path: path.to_string(),
            source,
        };

        // Same path means same content; a second write is a no-op.
        if let Ok(existing) = tokio::fs::metadata(&target).await {
            if existing.is_file() && existing.len() == bytes.len() as u64 {
                tracing::debug!(path, "Blob already stored");
                return Ok(StoredBlob {
                    path: path.to_string(),
                    newly_written: false,
                });
            }
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let temp = target.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&temp, bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_err(e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_err(e));
        }

        tracing::debug!(path, size = bytes.len(), "Blob stored");
        Ok(StoredBlob {
            path: path.to_string(),
            newly_written: true,
        })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

// ─── In-memory ───────────────────────────────────────────────

/// Blob store held in memory. Clones share data.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.get(path).map(|b| b.value().clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<StoredBlob, StorageError> {
        check_relative(path)?;
        let previous = self.blobs.insert(path.to_string(), bytes.to_vec());
        Ok(StoredBlob {
            path: path.to_string(),
            newly_written: previous.is_none(),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.blobs.remove(path);
        Ok(())
    }
}
