//! Local directory blob storage
//!
//! Blobs live at `<root>/<container>/<blob name>`. Used for development and
//! for running the service against files already on disk.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use osw_confidence_core::error::{ConfidenceError, Result};
use osw_confidence_core::ports::BlobStorage;

use crate::blob::blob_name;

#[derive(Debug, Clone)]
pub struct FileBlobStorage {
    root: PathBuf,
}

impl FileBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of a blob, or `None` if the URL names no blob
    pub fn resolve(&self, container: &str, remote_url: &str) -> Option<PathBuf> {
        let name = blob_name(container, remote_url)?;
        Some(self.root.join(container).join(name))
    }
}

#[async_trait]
impl BlobStorage for FileBlobStorage {
    async fn fetch(&self, container: &str, remote_url: &str) -> Result<Vec<u8>> {
        let not_found = || ConfidenceError::StorageNotFound {
            container: container.to_string(),
            url: remote_url.to_string(),
        };

        let path = self.resolve(container, remote_url).ok_or_else(not_found)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), size = bytes.len(), "Read blob from disk");
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(ConfidenceError::Storage {
                container: container.to_string(),
                url: remote_url.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
