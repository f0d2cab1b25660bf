//! Dataset archive extraction

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use osw_confidence_core::error::{ConfidenceError, Result};
use osw_confidence_core::models::ExtractedArchive;

/// Token identifying the node data entry
pub const NODES_TOKEN: &str = "nodes";

/// Resource-fork folder added by macOS archivers
pub const MACOSX_TOKEN: &str = "__MACOSX";

/// Unpacks dataset archives into a job workspace
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract every entry of `archive_path` into `dest_dir`
    ///
    /// Entry paths are preserved relative to `dest_dir`. The returned entry list
    /// keeps archive listing order and `nodes_file` points at the materialized
    /// node data, if any entry qualifies.
    ///
    /// `cancel` is checked before each entry; once it fires nothing more is
    /// written and [`ConfidenceError::Cancelled`] is returned.
    pub fn extract(
        archive_path: &Path,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExtractedArchive> {
        let archive_error = |reason: String| ConfidenceError::Archive {
            path: archive_path.to_path_buf(),
            reason,
        };

        let file = File::open(archive_path).map_err(|e| archive_error(e.to_string()))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| archive_error(format!("not a zip archive: {}", e)))?;

        fs::create_dir_all(dest_dir)?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut relative_paths: Vec<PathBuf> = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            if cancel.is_cancelled() {
                tracing::info!(
                    archive = %archive_path.display(),
                    extracted = entries.len(),
                    "Extraction cancelled"
                );
                return Err(ConfidenceError::Cancelled);
            }

            let mut entry = archive.by_index(i).map_err(|e| archive_error(e.to_string()))?;
            let name = entry.name().to_string();

            let relative = entry.enclosed_name().ok_or_else(|| {
                archive_error(format!("entry '{}' escapes the archive root", name))
            })?;
            let out_path = dest_dir.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
            } else {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&out_path)?;
                io::copy(&mut entry, &mut out)
                    .map_err(|e| archive_error(format!("failed to extract '{}': {}", name, e)))?;
            }

            relative_paths.push(relative.to_path_buf());
            entries.push(name);
        }

        let nodes_file =
            select_nodes_entry(&entries).map(|idx| dest_dir.join(&relative_paths[idx]));

        tracing::info!(
            archive = %archive_path.display(),
            entry_count = entries.len(),
            nodes_file = ?nodes_file,
            "Extracted dataset archive"
        );

        Ok(ExtractedArchive { nodes_file, entries })
    }
}

/// Index of the node data entry
///
/// The first file entry, in listing order, whose path contains `nodes` and does
/// not belong to a `__MACOSX` folder.
pub fn select_nodes_entry(entries: &[String]) -> Option<usize> {
    entries.iter().position(|entry| {
        !entry.contains(MACOSX_TOKEN) && !entry.ends_with('/') && entry.contains(NODES_TOKEN)
    })
}
