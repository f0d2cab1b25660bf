//! Error types for the confidence service

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfidenceError {
    // Intake errors
    #[error("Malformed confidence request: {reason}")]
    Intake { reason: String },

    #[error("Invalid job id '{job_id}': {reason}")]
    InvalidJobId { job_id: String, reason: String },

    #[error("Job '{job_id}' is already being processed")]
    JobInProgress { job_id: String },

    // Archive errors
    #[error("Failed to read archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("No nodes file found in archive {path}")]
    NodesFileMissing { path: PathBuf },

    // Geometry errors
    #[error("Invalid geometry in {path}: {reason}")]
    Geometry { path: PathBuf, reason: String },

    #[error("Sub-region file {path} is not a valid GeoJSON FeatureCollection: {reason}")]
    SubRegionValidation { path: PathBuf, reason: String },

    // Oracle errors
    #[error("Scoring failed for {path}: {reason}")]
    Scoring { path: PathBuf, reason: String },

    // Storage errors
    #[error("Failed to fetch {url} from container '{container}': {reason}")]
    Storage {
        container: String,
        url: String,
        reason: String,
    },

    #[error("File not found in container '{container}': {url}")]
    StorageNotFound { container: String, url: String },

    // Message bus errors
    #[error("Message bus error on topic '{topic}': {reason}")]
    Bus { topic: String, reason: String },

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Job cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ConfidenceError {
    /// Whether this error ends the job with a failure response
    ///
    /// Sub-region validation problems only downgrade the job to hull-only scoring.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ConfidenceError::SubRegionValidation { .. })
    }
}

impl From<serde_json::Error> for ConfidenceError {
    fn from(err: serde_json::Error) -> Self {
        ConfidenceError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfidenceError>;
