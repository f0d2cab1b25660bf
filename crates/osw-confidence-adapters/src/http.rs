//! HTTP clients for remote blob storage and the scoring oracle

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

use osw_confidence_core::error::{ConfidenceError, Result};
use osw_confidence_core::models::Credentials;
use osw_confidence_core::ports::{BlobStorage, ScoringOracle};

use crate::blob::blob_name;

/// Reported when the oracle does not publish its version
pub const UNKNOWN_LIBRARY_VERSION: &str = "unknown";

/// Blob storage reached over plain HTTP(S) GET
pub struct HttpBlobStorage {
    /// Base URL for container-relative references
    /// (e.g., "https://account.blob.core.windows.net")
    base_url: Option<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpBlobStorage {
    /// Create a storage client that only accepts absolute URLs
    pub fn new() -> Self {
        Self { base_url: None, client: reqwest::Client::new() }
    }

    /// Resolve relative references against `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: Some(base_url.into()), client: reqwest::Client::new() }
    }

    fn request_url(&self, container: &str, remote_url: &str) -> Option<Url> {
        if let Ok(url) = Url::parse(remote_url) {
            return matches!(url.scheme(), "http" | "https").then_some(url);
        }

        let name = blob_name(container, remote_url)?;
        let mut url = Url::parse(self.base_url.as_deref()?).ok()?;
        url.path_segments_mut().ok()?.pop_if_empty().push(container).extend(name.split('/'));
        Some(url)
    }
}

impl Default for HttpBlobStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStorage for HttpBlobStorage {
    async fn fetch(&self, container: &str, remote_url: &str) -> Result<Vec<u8>> {
        let storage_error = |reason: String| ConfidenceError::Storage {
            container: container.to_string(),
            url: remote_url.to_string(),
            reason,
        };

        let url = self.request_url(container, remote_url).ok_or_else(|| {
            storage_error("not an http(s) URL and no base URL configured".to_string())
        })?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| storage_error(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ConfidenceError::StorageNotFound {
                container: container.to_string(),
                url: remote_url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(storage_error(format!("server responded with {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| storage_error(format!("failed to read body: {}", e)))?;

        tracing::debug!(url = %url, size = bytes.len(), "Downloaded blob");
        Ok(bytes.to_vec())
    }
}

/// Client of the remote confidence scoring service
pub struct HttpScoringOracle {
    /// Base URL of the scoring service (e.g., "http://localhost:9000")
    base_url: String,

    /// Version of the scoring library behind the service
    library_version: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpScoringOracle {
    /// Create an oracle client with an unknown library version
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            library_version: UNKNOWN_LIBRARY_VERSION.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_library_version(mut self, version: impl Into<String>) -> Self {
        self.library_version = version.into();
        self
    }

    /// Create a client and ask the service for its library version
    ///
    /// An unreachable version endpoint is logged and leaves the version unknown.
    pub async fn connect(base_url: impl Into<String>) -> Self {
        let oracle = Self::new(base_url);
        match oracle.fetch_version().await {
            Ok(version) => oracle.with_library_version(version),
            Err(e) => {
                tracing::warn!(
                    base_url = %oracle.base_url,
                    "Could not read scoring library version: {}",
                    e
                );
                oracle
            }
        }
    }

    async fn fetch_version(&self) -> std::result::Result<String, reqwest::Error> {
        let response: VersionResponse = self
            .client
            .get(format!("{}/version", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.version)
    }
}

#[async_trait]
impl ScoringOracle for HttpScoringOracle {
    async fn score(&self, region_file: &Path, credentials: &Credentials) -> Result<f64> {
        let scoring_error = |reason: String| ConfidenceError::Scoring {
            path: region_file.to_path_buf(),
            reason,
        };

        let content = tokio::fs::read_to_string(region_file)
            .await
            .map_err(|e| scoring_error(format!("cannot read region file: {}", e)))?;
        let region: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| scoring_error(format!("region file is not JSON: {}", e)))?;

        let response = self
            .client
            .post(format!("{}/score", self.base_url))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .json(&ScoreRequest { region })
            .send()
            .await
            .map_err(|e| scoring_error(format!("failed to reach scoring service: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(scoring_error(format!(
                "scoring service error ({}): {}",
                status, error_text
            )));
        }

        let score: ScoreResponse = response
            .json()
            .await
            .map_err(|e| scoring_error(format!("failed to parse scoring response: {}", e)))?;

        if !score.score.is_finite() {
            return Err(scoring_error(format!("score {} is not a finite number", score.score)));
        }

        Ok(score.score)
    }

    fn library_version(&self) -> &str {
        &self.library_version
    }
}

/// Request body for the scoring endpoint
#[derive(Debug, Serialize)]
struct ScoreRequest {
    region: serde_json::Value,
}

/// Response from the scoring endpoint
#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: f64,
}

/// Response from the version endpoint
#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}
