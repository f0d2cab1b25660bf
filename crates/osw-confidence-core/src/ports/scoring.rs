use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::models::Credentials;

/// Port for the external confidence scoring oracle
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Score the region stored as a single-feature GeoJSON file
    async fn score(&self, region_file: &Path, credentials: &Credentials) -> Result<f64>;

    /// Version string reported as `confidence_library_version`
    fn library_version(&self) -> &str;
}
