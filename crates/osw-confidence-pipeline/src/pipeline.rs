use geojson::FeatureCollection;
use tokio_util::sync::CancellationToken;

use osw_confidence_core::error::{ConfidenceError, Result};
use osw_confidence_core::models::{JobStage, ScoredSubRegion, SubRegion};
use osw_confidence_core::JobWorkspace;
use osw_confidence_geo::{ArchiveExtractor, RegionBuilder, ResultAssembler, SubRegionSplitter};

use crate::scoring::ScoringCoordinator;

/// Confidence pipeline over a prepared job workspace
///
/// Expects the dataset archive at [`JobWorkspace::archive_path`] and, when
/// sub-regions were supplied, their file at [`JobWorkspace::sub_regions_path`].
pub struct ConfidencePipeline {
    coordinator: ScoringCoordinator,
}

impl ConfidencePipeline {
    /// Create a new confidence pipeline
    pub fn new(coordinator: ScoringCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn library_version(&self) -> &str {
        self.coordinator.library_version()
    }

    /// Run extraction, hull building, scoring and assembly for one job
    ///
    /// Once `cancel` fires no further phase starts and the running one stops
    /// at its next checkpoint. The returned future only resolves after all
    /// blocking work it started has finished, so the workspace can be removed
    /// as soon as it does.
    pub async fn run(
        &self,
        workspace: &JobWorkspace,
        sub_regions_available: bool,
        cancel: &CancellationToken,
    ) -> Result<FeatureCollection> {
        let job_id = workspace.job_id().to_string();

        // Phase 1: Extract the archive and locate the node data
        tracing::info!(job_id = %job_id, stage = %JobStage::Extracting, "Extracting dataset");
        let archive_path = workspace.archive_path();
        let extract_dir = workspace.extract_dir();
        let extracted = {
            let archive_path = archive_path.clone();
            let token = cancel.clone();
            run_blocking(cancel, move || {
                ArchiveExtractor::extract(&archive_path, &extract_dir, &token)
            })
            .await?
        };
        let nodes_file = extracted
            .nodes_file
            .ok_or(ConfidenceError::NodesFileMissing { path: archive_path })?;

        // Phase 2: Hull region and optional sub-regions
        let hull_path = workspace.hull_path();
        {
            let hull_path = hull_path.clone();
            run_blocking(cancel, move || RegionBuilder::build_hull(&nodes_file, &hull_path))
                .await?;
        }

        let sub_regions_path = workspace.sub_regions_path();
        let sub_regions = if sub_regions_available {
            let path = sub_regions_path.clone();
            let parsed =
                run_blocking(cancel, move || SubRegionSplitter::parse(&path).into_result(&path))
                    .await;
            match parsed {
                Ok(regions) => Some(regions),
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(job_id = %job_id, "{}, scoring the hull only", e);
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        // Phase 3: Scoring
        tracing::info!(
            job_id = %job_id,
            stage = %JobStage::Scoring,
            sub_region_count = sub_regions.as_ref().map_or(0, Vec::len),
            "Scoring regions"
        );
        let scoring = self.coordinator.score_all(
            &hull_path,
            sub_regions.as_deref().unwrap_or_default(),
            &sub_regions_path,
        );
        let scores = tokio::select! {
            scores = scoring => scores?,
            _ = cancel.cancelled() => return Err(ConfidenceError::Cancelled),
        };

        // Phase 4: Assembly
        tracing::info!(job_id = %job_id, stage = %JobStage::Assembling, "Assembling result");
        let scored = sub_regions.map(|regions| pair_scores(regions, scores.sub_regions));
        let hull_score = scores.hull;
        run_blocking(cancel, move || {
            ResultAssembler::assemble_from_artifact(&hull_path, hull_score, scored)
        })
        .await
    }
}

fn pair_scores(regions: Vec<SubRegion>, scores: Vec<Option<f64>>) -> Vec<ScoredSubRegion> {
    regions
        .into_iter()
        .zip(scores)
        .map(|(region, score)| ScoredSubRegion { region, score })
        .collect()
}

/// Run synchronous file and geometry work on the blocking pool
///
/// Nothing is started once `cancel` has fired. Work already started is always
/// awaited to completion.
async fn run_blocking<F, T>(cancel: &CancellationToken, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(ConfidenceError::Cancelled);
    }

    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ConfidenceError::Invariant(format!("blocking task failed: {}", e)))?
}
