//! Oracle calls for the hull and each sub-region

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use geojson::Geometry;
use osw_confidence_core::config::SubRegionFailurePolicy;
use osw_confidence_core::error::Result;
use osw_confidence_core::models::{Credentials, RegionScores, SubRegion};
use osw_confidence_core::ports::ScoringOracle;
use osw_confidence_geo::artifact::write_single_feature;

/// Scores regions sequentially through the oracle
#[derive(Clone)]
pub struct ScoringCoordinator {
    oracle: Arc<dyn ScoringOracle>,
    credentials: Credentials,
    policy: SubRegionFailurePolicy,
}

impl ScoringCoordinator {
    pub fn new(
        oracle: Arc<dyn ScoringOracle>,
        credentials: Credentials,
        policy: SubRegionFailurePolicy,
    ) -> Self {
        Self { oracle, credentials, policy }
    }

    pub fn library_version(&self) -> &str {
        self.oracle.library_version()
    }

    /// Score one region file, logging how long the oracle took
    pub async fn score_region(&self, region_file: &Path) -> Result<f64> {
        let started = Instant::now();
        let result = self.oracle.score(region_file, &self.credentials).await;
        let elapsed_secs = started.elapsed().as_secs_f64();

        match &result {
            Ok(score) => tracing::info!(
                region = %region_file.display(),
                score,
                elapsed_secs,
                "Scored region"
            ),
            Err(e) => tracing::warn!(
                region = %region_file.display(),
                elapsed_secs,
                "Scoring failed: {}",
                e
            ),
        }

        result
    }

    /// Score the hull, then every sub-region in order
    ///
    /// Each polygon sub-region is written next to `sub_regions_file` as
    /// `<stem>_<index><ext>` before it is scored. Non-polygon entries get
    /// `None` without an oracle call.
    pub async fn score_all(
        &self,
        hull_path: &Path,
        sub_regions: &[SubRegion],
        sub_regions_file: &Path,
    ) -> Result<RegionScores> {
        let hull = self.score_region(hull_path).await?;

        let mut scores = Vec::with_capacity(sub_regions.len());
        for region in sub_regions {
            let Some(polygon) = region.polygon() else {
                scores.push(None);
                continue;
            };

            let region_file = sub_region_file_name(sub_regions_file, region.index);
            let outcome = match write_region(&region_file, polygon) {
                Ok(()) => self.score_region(&region_file).await,
                Err(e) => Err(e),
            };

            match (outcome, self.policy) {
                (Ok(score), _) => scores.push(Some(score)),
                (Err(e), SubRegionFailurePolicy::Isolate) => {
                    tracing::warn!(
                        index = region.index,
                        "Sub-region scoring failed, recording null score: {}",
                        e
                    );
                    scores.push(None);
                }
                (Err(e), SubRegionFailurePolicy::Abort) => return Err(e),
            }
        }

        Ok(RegionScores { hull, sub_regions: scores })
    }
}

/// The oracle only sees the polygon; caller properties stay out of its input
fn write_region(path: &Path, polygon: &Geometry) -> Result<()> {
    write_single_feature(path, polygon.clone())
}

/// Per-sub-region file name: `<stem>_<index><ext>` in the same directory
pub fn sub_region_file_name(base: &Path, index: usize) -> PathBuf {
    let stem = base.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}_{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_{}", stem, index),
    };
    base.with_file_name(name)
}
