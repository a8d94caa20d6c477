//! Application configuration loaded from environment variables.

use crate::models::Sport;
use std::env;
use std::path::PathBuf;

/// Default upload cap (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Which record store backs staging records and sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// In-process store; data is lost on restart
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Hard cap on uploaded file size
    pub max_upload_bytes: u64,
    /// Root directory of the raw file store
    pub upload_root: PathBuf,
    /// Sport used when a file does not name one
    pub default_sport: Sport,
    pub store_backend: StoreBackend,
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_root: PathBuf::from("data/uploads"),
            default_sport: Sport::Run,
            store_backend: StoreBackend::Memory,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or(ConfigError::Invalid("MAX_UPLOAD_BYTES", raw))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let port = parse_port(env::var("PORT").ok())?;

        let default_sport = match env::var("DEFAULT_SPORT") {
            Ok(raw) => raw
                .parse::<Sport>()
                .map_err(|_| ConfigError::Invalid("DEFAULT_SPORT", raw))?,
            Err(_) => Sport::Run,
        };

        let store_backend = match env::var("INGEST_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(other) => return Err(ConfigError::Invalid("INGEST_STORE", other.to_string())),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            max_upload_bytes,
            upload_root: env::var("UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/uploads")),
            default_sport,
            store_backend,
        })
    }
}

/// `PORT` defaults to 8080; port 0 is rejected.
fn parse_port(raw: Option<String>) -> Result<u16, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or(ConfigError::Invalid("PORT", raw)),
        None => Ok(8080),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
