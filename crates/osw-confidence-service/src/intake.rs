//! Job intake: request topic listener and per-job workers

use geojson::FeatureCollection;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use osw_confidence_core::error::{ConfidenceError, Result};
use osw_confidence_core::models::{
    recover_job_id, ConfidenceRequest, ConfidenceResponse, JobStage, QueueMessage,
};
use osw_confidence_core::ports::{BlobStorage, MessageBus};
use osw_confidence_core::{JobWorkspace, ServiceConfig};
use osw_confidence_pipeline::ConfidencePipeline;

use crate::active::{ActiveJobs, JobClaim};
use crate::dedup::DedupCache;
use crate::simulate::simulated_scores;

/// Listens for confidence requests and answers each exactly once
///
/// Every accepted request runs as its own task. At most
/// `max_concurrent_jobs` of them do work at the same time; the rest wait for a
/// permit without holding up the listener.
#[derive(Clone)]
pub struct JobIntakeService {
    config: Arc<ServiceConfig>,
    bus: Arc<dyn MessageBus>,
    storage: Arc<dyn BlobStorage>,
    pipeline: Arc<ConfidencePipeline>,
    permits: Arc<Semaphore>,
    dedup: Arc<Mutex<DedupCache>>,
    active: ActiveJobs,
}

impl JobIntakeService {
    pub fn new(
        config: Arc<ServiceConfig>,
        bus: Arc<dyn MessageBus>,
        storage: Arc<dyn BlobStorage>,
        pipeline: Arc<ConfidencePipeline>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config,
            bus,
            storage,
            pipeline,
            permits,
            dedup: Arc::new(Mutex::new(DedupCache::default())),
            active: ActiveJobs::new(),
        }
    }

    /// Consume the request subscription until it ends or `shutdown` fires
    ///
    /// In-flight jobs are awaited before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.download_root).await?;

        let mut subscription = self
            .bus
            .subscribe(&self.config.incoming_topic, &self.config.incoming_subscription)
            .await?;

        tracing::info!(
            topic = %self.config.incoming_topic,
            subscription = %self.config.incoming_subscription,
            download_root = %self.config.download_root.display(),
            simulate = self.config.is_simulated(),
            "Confidence service listening"
        );

        let mut jobs = JoinSet::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown requested, no longer accepting requests");
                        break;
                    }
                }
                message = subscription.recv() => {
                    match message {
                        Some(message) => self.accept(message, &mut jobs),
                        None => {
                            tracing::info!("Request subscription closed");
                            break;
                        }
                    }
                }
                Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                    log_join(joined);
                }
            }
        }

        if !jobs.is_empty() {
            tracing::info!(in_flight = jobs.len(), "Waiting for in-flight jobs");
        }
        while let Some(joined) = jobs.join_next().await {
            log_join(joined);
        }

        tracing::info!("Confidence service stopped");
        Ok(())
    }

    /// Decode one delivery and spawn the task that answers it
    fn accept(&self, message: QueueMessage, jobs: &mut JoinSet<()>) {
        tracing::info!(
            message_id = %message.message_id,
            message_type = %message.message_type,
            stage = %JobStage::Received,
            "Confidence request received"
        );

        let request = match ConfidenceRequest::from_message(&message) {
            Ok(request) => request,
            Err(e) => {
                match recover_job_id(&message) {
                    Some(job_id) => {
                        tracing::warn!(job_id = %job_id, "Rejecting malformed request: {}", e);
                        let service = self.clone();
                        jobs.spawn(async move { service.reject(message, job_id, e).await });
                    }
                    None => tracing::error!(
                        message_id = %message.message_id,
                        "Dropping request without a usable jobId: {}",
                        e
                    ),
                }
                return;
            }
        };

        let fresh = match self.dedup.lock() {
            Ok(mut cache) => cache.insert(request.job_id(), &request.message_id),
            Err(poisoned) => poisoned.into_inner().insert(request.job_id(), &request.message_id),
        };
        if !fresh {
            tracing::info!(
                job_id = %request.job_id(),
                message_id = %request.message_id,
                "Duplicate delivery ignored"
            );
            return;
        }

        let Some(claim) = self.active.claim(request.job_id()) else {
            tracing::warn!(
                job_id = %request.job_id(),
                message_id = %request.message_id,
                "Job already in progress, refusing concurrent request"
            );
            let service = self.clone();
            jobs.spawn(async move {
                let error = ConfidenceError::JobInProgress { job_id: request.job_id().to_string() };
                service.respond(&service.failure(&request, &error)).await;
            });
            return;
        };

        let service = self.clone();
        jobs.spawn(async move { service.handle(request, claim).await });
    }

    async fn reject(&self, message: QueueMessage, job_id: String, error: ConfidenceError) {
        let response = ConfidenceResponse::failure(
            message.message_type,
            message.message_id,
            job_id,
            error.to_string(),
            self.pipeline.library_version(),
        );
        self.respond(&response).await;
    }

    /// Run one accepted job to its single response
    ///
    /// `claim` keeps the job id reserved until the workspace is gone; it is
    /// released before the response goes out.
    async fn handle(&self, request: ConfidenceRequest, claim: JobClaim) {
        let job_id = request.job_id().to_string();

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                let error = ConfidenceError::Invariant("job permits closed".to_string());
                self.respond(&self.failure(&request, &error)).await;
                return;
            }
        };

        if self.config.is_simulated() {
            tracing::info!(job_id = %job_id, "Simulate mode, returning canned result");
            let response = match simulated_scores() {
                Ok(scores) => {
                    ConfidenceResponse::success(&request, scores, self.pipeline.library_version())
                }
                Err(e) => self.failure(&request, &e),
            };
            drop(claim);
            self.respond(&response).await;
            return;
        }

        let mut workspace = match JobWorkspace::prepare(&self.config.download_root, &job_id) {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::error!(job_id = %job_id, "Cannot prepare job workspace: {}", e);
                drop(claim);
                self.respond(&self.failure(&request, &e)).await;
                return;
            }
        };

        let outcome = self.process_with_deadline(&request, &workspace).await;

        let response = match outcome {
            Ok(scores) => {
                tracing::info!(
                    job_id = %job_id,
                    feature_count = scores.features.len(),
                    "Job processed successfully"
                );
                ConfidenceResponse::success(&request, scores, self.pipeline.library_version())
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, "Job failed: {}", e);
                self.failure(&request, &e)
            }
        };

        // Nothing writes to the workspace once the pipeline has returned
        if let Err(e) = workspace.teardown() {
            tracing::warn!(job_id = %job_id, "Failed to remove job workspace: {}", e);
        }
        drop(claim);

        self.respond(&response).await;
        tracing::info!(job_id = %job_id, stage = %JobStage::Done, "Job complete");
    }

    /// Process the job under its deadline
    ///
    /// On expiry the pipeline is cancelled and awaited until it stops, so the
    /// workspace is idle when this returns.
    async fn process_with_deadline(
        &self,
        request: &ConfidenceRequest,
        workspace: &JobWorkspace,
    ) -> Result<FeatureCollection> {
        let cancel = CancellationToken::new();
        let process = self.process(request, workspace, &cancel);
        tokio::pin!(process);

        tokio::select! {
            outcome = &mut process => outcome,
            _ = tokio::time::sleep(self.config.job_timeout) => {
                tracing::warn!(
                    job_id = %request.job_id(),
                    timeout = ?self.config.job_timeout,
                    "Job deadline reached, cancelling"
                );
                cancel.cancel();
                if let Err(e) = process.await {
                    tracing::debug!(job_id = %request.job_id(), "Cancelled job stopped: {}", e);
                }
                Err(ConfidenceError::Timeout(self.config.job_timeout))
            }
        }
    }

    async fn process(
        &self,
        request: &ConfidenceRequest,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<FeatureCollection> {
        let job_id = request.job_id();
        tracing::info!(
            job_id = %job_id,
            stage = %JobStage::Downloading,
            "Downloading input files"
        );

        let container = &self.config.container_name;
        let archive =
            until_cancelled(cancel, self.storage.fetch(container, &request.data.data_file)).await?;
        tokio::fs::write(workspace.archive_path(), archive).await?;

        let sub_regions_available = match request.sub_regions_file() {
            Some(url) => self.download_sub_regions(job_id, url, workspace, cancel).await,
            None => false,
        };

        self.pipeline.run(workspace, sub_regions_available, cancel).await
    }

    /// Fetch the optional sub-region file; any failure means hull-only scoring
    async fn download_sub_regions(
        &self,
        job_id: &str,
        url: &str,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> bool {
        let fetch = self.storage.fetch(&self.config.container_name, url);
        let bytes = match until_cancelled(cancel, fetch).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    "Sub-region file unavailable, scoring the hull only: {}",
                    e
                );
                return false;
            }
        };

        match tokio::fs::write(workspace.sub_regions_path(), bytes).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    "Cannot store sub-region file, scoring the hull only: {}",
                    e
                );
                false
            }
        }
    }

    fn failure(&self, request: &ConfidenceRequest, error: &ConfidenceError) -> ConfidenceResponse {
        ConfidenceResponse::failure(
            request.message_type.clone(),
            request.message_id.clone(),
            request.job_id(),
            error.to_string(),
            self.pipeline.library_version(),
        )
    }

    async fn respond(&self, response: &ConfidenceResponse) {
        tracing::info!(
            job_id = %response.job_id(),
            success = response.data.success,
            stage = %JobStage::Responding,
            "Sending confidence response"
        );

        let published = match response.to_message() {
            Ok(message) => self.bus.publish(&self.config.outgoing_topic, message).await,
            Err(e) => Err(e),
        };

        if let Err(e) = published {
            tracing::error!(job_id = %response.job_id(), "Failed to publish response: {}", e);
        }
    }
}

/// Await `work` unless `cancel` fires first
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        result = work => result,
        _ = cancel.cancelled() => Err(ConfidenceError::Cancelled),
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!("Job task panicked: {}", e);
        } else {
            tracing::warn!("Job task cancelled: {}", e);
        }
    }
}
