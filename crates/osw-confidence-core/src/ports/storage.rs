use async_trait::async_trait;

use crate::error::Result;

/// Port for blob storage downloads
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Fetch the blob behind `remote_url` in `container`
    ///
    /// A missing blob is reported as `ConfidenceError::StorageNotFound`.
    async fn fetch(&self, container: &str, remote_url: &str) -> Result<Vec<u8>>;
}
