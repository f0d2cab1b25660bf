//! Per-job scratch directory.
//!
//! Every file a job touches (downloaded archive, extracted entries, hull
//! artifact, per-sub-region files) lives under `<download_root>/<job_id>`, so
//! concurrent jobs never share a subtree and teardown is a single recursive
//! removal.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{ConfidenceError, Result};

const ARCHIVE_FILE: &str = "osw.zip";
const SUB_REGIONS_FILE: &str = "sub_regions.geojson";
const EXTRACT_DIR: &str = "extracted";

/// Filesystem area owned by one job
///
/// `teardown` is the normal release path. If a job exits any other way
/// (panic, cancellation) the directory is removed on drop.
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: String,
    dir: PathBuf,
    torn_down: bool,
}

impl JobWorkspace {
    /// Create the job directory under `root` if it does not exist yet
    pub fn prepare(root: &Path, job_id: &str) -> Result<Self> {
        validate_job_id(job_id)?;

        let dir = root.join(job_id);
        fs::create_dir_all(&dir)?;

        tracing::debug!(job_id = %job_id, dir = %dir.display(), "Prepared job workspace");

        Ok(Self { job_id: job_id.to_string(), dir, torn_down: false })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file directly inside the workspace
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Download target of the dataset archive
    pub fn archive_path(&self) -> PathBuf {
        self.path(ARCHIVE_FILE)
    }

    /// Download target of the optional sub-region file
    pub fn sub_regions_path(&self) -> PathBuf {
        self.path(SUB_REGIONS_FILE)
    }

    /// Directory the archive entries are extracted into
    pub fn extract_dir(&self) -> PathBuf {
        self.path(EXTRACT_DIR)
    }

    /// Location of the convex hull artifact
    pub fn hull_path(&self) -> PathBuf {
        self.path(&format!("{}.geojson", self.job_id))
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Remove the whole job directory tree
    ///
    /// Calling this more than once, or on a directory that is already gone, is
    /// not an error.
    pub fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::debug!(job_id = %self.job_id, "Removed job workspace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfidenceError::Io(e)),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if !self.torn_down {
            if let Err(e) = self.teardown() {
                tracing::warn!(job_id = %self.job_id, "Failed to remove job workspace: {}", e);
            }
        }
    }
}

/// Reject job ids that would place the workspace outside the download root
pub fn validate_job_id(job_id: &str) -> Result<()> {
    let invalid = |reason: &str| ConfidenceError::InvalidJobId {
        job_id: job_id.to_string(),
        reason: reason.to_string(),
    };

    if job_id.trim().is_empty() {
        return Err(invalid("job id is empty"));
    }
    if job_id.contains(['/', '\\', '\0']) {
        return Err(invalid("job id must not contain path separators"));
    }

    let mut components = Path::new(job_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("job id must be a single plain path segment")),
    }
}
