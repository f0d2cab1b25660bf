//! End-to-end tests of the intake service over the in-memory bus and storage

use async_trait::async_trait;
use osw_confidence_adapters::{MemoryBlobStorage, MemoryBus};
use osw_confidence_core::error::Result;
use osw_confidence_core::models::{
    ConfidenceResponse, Credentials, QueueMessage, CONFIDENCE_SCORE_PROPERTY,
};
use osw_confidence_core::ports::{MessageBus, ScoringOracle, Subscription};
use osw_confidence_core::ServiceConfig;
use osw_confidence_pipeline::{ConfidencePipeline, ScoringCoordinator};
use osw_confidence_service::JobIntakeService;
use serde_json::json;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use zip::write::SimpleFileOptions;

const REQUESTS: &str = "confidence-request";
const RESPONSES: &str = "confidence-response";
const CONTAINER: &str = "osw";
const DATA_URL: &str = "https://storage.example.org/osw/J1/osw.zip";
const SUB_REGIONS_URL: &str = "https://storage.example.org/osw/J1/sub_regions.geojson";

const NODES: &str = r#"{"type":"FeatureCollection","features":[
    {"type":"Feature","properties":{},
     "geometry":{"type":"Point","coordinates":[-122.1322201,47.63528]}},
    {"type":"Feature","properties":{},
     "geometry":{"type":"Point","coordinates":[-122.1469453,47.6460242]}},
    {"type":"Feature","properties":{},
     "geometry":{"type":"Point","coordinates":[-122.1285859,47.6378078]}},
    {"type":"Feature","properties":{},
     "geometry":{"type":"Point","coordinates":[-122.1403351,47.6497278]}}
]}"#;

/// Oracle with a fixed score that counts its calls and can be slowed down
struct CountingOracle {
    score: f64,
    delay: Duration,
    /// Only regions of this job are delayed; `None` delays every call
    slow_job: Option<String>,
    calls: AtomicUsize,
}

impl CountingOracle {
    fn new(score: f64) -> Self {
        Self { score, delay: Duration::ZERO, slow_job: None, calls: AtomicUsize::new(0) }
    }

    fn slow(delay: Duration) -> Self {
        Self { delay, ..Self::new(0.75) }
    }

    fn slow_for(job_id: &str, delay: Duration) -> Self {
        Self { slow_job: Some(job_id.to_string()), ..Self::slow(delay) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringOracle for CountingOracle {
    async fn score(&self, region_file: &Path, _credentials: &Credentials) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delayed = match &self.slow_job {
            Some(job_id) => region_file.components().any(|c| c.as_os_str() == job_id.as_str()),
            None => true,
        };
        if delayed {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.score)
    }

    fn library_version(&self) -> &str {
        "0.2.1"
    }
}

struct Harness {
    bus: MemoryBus,
    storage: MemoryBlobStorage,
    oracle: Arc<CountingOracle>,
    download_root: TempDir,
    responses: Subscription,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<Result<()>>,
}

impl Harness {
    /// Normal mode with a generous deadline
    async fn serving(oracle: CountingOracle) -> Self {
        Self::start(false, oracle, Duration::from_secs(60)).await
    }

    async fn start(simulate: bool, oracle: CountingOracle, job_timeout: Duration) -> Self {
        Self::start_with(oracle, |config| {
            config.simulate = simulate;
            config.job_timeout = job_timeout;
        })
        .await
    }

    async fn start_with(
        oracle: CountingOracle,
        configure: impl FnOnce(&mut ServiceConfig),
    ) -> Self {
        let bus = MemoryBus::new();
        let storage = MemoryBlobStorage::new();
        let oracle = Arc::new(oracle);
        let download_root = TempDir::new().unwrap();

        let mut config = ServiceConfig {
            incoming_topic: REQUESTS.to_string(),
            incoming_subscription: "confidence-sub".to_string(),
            outgoing_topic: RESPONSES.to_string(),
            container_name: CONTAINER.to_string(),
            credentials: Credentials::new("mapper", "secret"),
            download_root: download_root.path().to_path_buf(),
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(60),
            ..ServiceConfig::with_defaults()
        };
        configure(&mut config);
        let config = Arc::new(config);

        let pipeline = Arc::new(ConfidencePipeline::new(ScoringCoordinator::new(
            oracle.clone(),
            config.credentials.clone(),
            config.sub_region_failures,
        )));

        let responses = bus.subscribe(RESPONSES, "test").await.unwrap();
        let service = JobIntakeService::new(
            config,
            Arc::new(bus.clone()),
            Arc::new(storage.clone()),
            pipeline,
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { service.run(shutdown_rx).await });

        // The listener subscribes asynchronously
        while bus.subscriber_count(REQUESTS) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        Self { bus, storage, oracle, download_root, responses, shutdown, handle }
    }

    async fn send(&self, message: QueueMessage) {
        self.bus.publish(REQUESTS, message).await.unwrap();
    }

    async fn next_response(&mut self) -> ConfidenceResponse {
        let message = tokio::time::timeout(Duration::from_secs(10), self.responses.recv())
            .await
            .expect("no response within 10s")
            .expect("response stream closed");
        ConfidenceResponse::from_message(&message).unwrap()
    }

    async fn assert_no_response(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(200), self.responses.recv()).await;
        assert!(next.is_err(), "unexpected response: {:?}", next);
    }

    fn workspace_count(&self) -> usize {
        std::fs::read_dir(self.download_root.path()).unwrap().count()
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

/// Archive whose extraction takes far longer than a short deadline
fn bulky_archive(filler_entries: usize) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..filler_entries {
        zip.start_file(format!("filler/{}/{}.txt", i % 100, i), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"filler").unwrap();
    }
    zip.start_file("nodes.geojson", SimpleFileOptions::default()).unwrap();
    zip.write_all(NODES.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn request(job_id: &str, message_id: &str, sub_regions_file: Option<&str>) -> QueueMessage {
    let mut data = json!({
        "jobId": job_id,
        "data_file": DATA_URL,
        "meta_file": "https://storage.example.org/osw/J1/meta.json",
        "trigger_type": "manual"
    });
    if let Some(url) = sub_regions_file {
        data["sub_regions_file"] = json!(url);
    }
    QueueMessage::new("confidence-calculation", message_id, data)
}

fn sub_regions(count: usize) -> String {
    let features: Vec<_> = (0..count)
        .map(|i| {
            let x = -122.145 + i as f64 * 0.003;
            json!({
                "type": "Feature",
                "properties": {"name": format!("block-{}", i)},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [x, 47.64], [x + 0.002, 47.64], [x + 0.002, 47.642], [x, 47.642], [x, 47.64]
                    ]]
                }
            })
        })
        .collect();
    json!({"type": "FeatureCollection", "features": features}).to_string()
}

#[tokio::test]
async fn test_hull_only_job_succeeds() {
    let mut harness = Harness::serving(CountingOracle::new(0.75)).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("osw/wa.nodes.geojson", NODES)]));

    harness.send(request("J1", "m1", None)).await;
    let response = harness.next_response().await;

    assert!(response.data.success, "{}", response.data.message);
    assert_eq!(response.job_id(), "J1");
    assert_eq!(response.message_id, "m1");
    assert_eq!(response.message_type, "confidence-calculation");
    assert_eq!(response.data.message, "Processed successfully");
    assert_eq!(response.data.confidence_library_version, "0.2.1");

    let scores = response.data.confidence_scores.unwrap();
    assert_eq!(scores.features.len(), 1);
    assert_eq!(scores.features[0].property(CONFIDENCE_SCORE_PROPERTY), Some(&json!(0.75)));

    assert_eq!(harness.workspace_count(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_sub_regions_are_scored_in_order() {
    let mut harness = Harness::serving(CountingOracle::new(0.75)).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));
    harness.storage.insert(CONTAINER, SUB_REGIONS_URL, sub_regions(4));

    harness.send(request("J1", "m1", Some(SUB_REGIONS_URL))).await;
    let response = harness.next_response().await;

    let scores = response.data.confidence_scores.unwrap();
    assert_eq!(scores.features.len(), 5);
    for (i, feature) in scores.features.iter().enumerate() {
        assert_eq!(feature.property(CONFIDENCE_SCORE_PROPERTY), Some(&json!(0.75)));
        if i > 0 {
            assert_eq!(feature.property("name"), Some(&json!(format!("block-{}", i - 1))));
        }
    }
    assert_eq!(harness.oracle.calls(), 5);

    harness.stop().await;
}

#[tokio::test]
async fn test_invalid_sub_region_file_degrades_to_hull() {
    let mut harness = Harness::serving(CountingOracle::new(0.5)).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));
    harness.storage.insert(CONTAINER, SUB_REGIONS_URL, "not json at all");

    harness.send(request("J1", "m1", Some(SUB_REGIONS_URL))).await;
    let response = harness.next_response().await;

    assert!(response.data.success);
    assert_eq!(response.data.confidence_scores.unwrap().features.len(), 1);
    harness.stop().await;
}

#[tokio::test]
async fn test_missing_sub_region_blob_degrades_to_hull() {
    let mut harness = Harness::serving(CountingOracle::new(0.5)).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    harness.send(request("J1", "m1", Some(SUB_REGIONS_URL))).await;
    let response = harness.next_response().await;

    assert!(response.data.success);
    assert_eq!(response.data.confidence_scores.unwrap().features.len(), 1);
    harness.stop().await;
}

#[tokio::test]
async fn test_simulate_mode_touches_nothing() {
    let mut harness = Harness::start(true, CountingOracle::new(0.1), Duration::from_secs(60)).await;

    harness.send(request("J7", "m7", Some(SUB_REGIONS_URL))).await;
    let response = harness.next_response().await;

    assert!(response.data.success);
    assert_eq!(response.job_id(), "J7");
    let scores = response.data.confidence_scores.unwrap();
    assert_eq!(scores.features.len(), 1);
    assert_eq!(scores.features[0].property(CONFIDENCE_SCORE_PROPERTY), Some(&json!(0.75)));

    assert!(harness.storage.fetched().is_empty());
    assert_eq!(harness.oracle.calls(), 0);
    assert_eq!(harness.workspace_count(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_missing_data_file_fails_job() {
    let mut harness = Harness::serving(CountingOracle::new(0.75)).await;

    harness.send(request("J2", "m2", None)).await;
    let response = harness.next_response().await;

    assert!(!response.data.success);
    assert_eq!(response.data.status, osw_confidence_core::models::JobStatus::Finished);
    assert!(response.data.confidence_scores.is_none());
    assert!(response.data.message.contains("not found"), "{}", response.data.message);
    assert_eq!(harness.workspace_count(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_archive_without_nodes_fails_job() {
    let mut harness = Harness::serving(CountingOracle::new(0.75)).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("edges.geojson", "{}")]));

    harness.send(request("J3", "m3", None)).await;
    let response = harness.next_response().await;

    assert!(!response.data.success);
    assert!(response.data.message.contains("No nodes file"), "{}", response.data.message);
    assert_eq!(harness.oracle.calls(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_malformed_messages_keep_service_running() {
    let mut harness = Harness::serving(CountingOracle::new(0.75)).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    // No jobId at all: logged and dropped
    harness
        .send(QueueMessage::new("confidence-calculation", "bad-1", json!({"data_file": DATA_URL})))
        .await;
    harness.assert_no_response().await;

    // Numeric jobId but missing fields: answered with a failure
    harness
        .send(QueueMessage::new("confidence-calculation", "bad-2", json!({"jobId": 123})))
        .await;
    let response = harness.next_response().await;
    assert!(!response.data.success);
    assert_eq!(response.job_id(), "123");
    assert_eq!(response.message_id, "bad-2");

    // Still serving
    harness.send(request("J1", "m1", None)).await;
    assert!(harness.next_response().await.data.success);

    assert_eq!(harness.workspace_count(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_path_escaping_job_id_is_rejected() {
    let mut harness = Harness::serving(CountingOracle::new(0.75)).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    harness.send(request("../escape", "m1", None)).await;
    let response = harness.next_response().await;

    assert!(!response.data.success);
    assert_eq!(response.job_id(), "../escape");
    assert!(harness.storage.fetched().is_empty());
    harness.stop().await;
}

#[tokio::test]
async fn test_duplicate_delivery_answered_once() {
    let mut harness = Harness::serving(CountingOracle::new(0.75)).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    harness.send(request("J1", "m1", None)).await;
    harness.send(request("J1", "m1", None)).await;

    assert!(harness.next_response().await.data.success);
    harness.assert_no_response().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_job_timeout_produces_failure() {
    let mut harness = Harness::start(
        false,
        CountingOracle::slow(Duration::from_secs(5)),
        Duration::from_millis(100),
    )
    .await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    harness.send(request("J9", "m9", None)).await;
    let response = harness.next_response().await;

    assert!(!response.data.success);
    assert!(response.data.message.contains("timed out"), "{}", response.data.message);
    assert_eq!(harness.workspace_count(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_jobs() {
    let mut harness = Harness::start(
        false,
        CountingOracle::slow(Duration::from_millis(200)),
        Duration::from_secs(60),
    )
    .await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    harness.send(request("J1", "m1", None)).await;
    // Let the listener pick the request up before shutting down
    while harness.oracle.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut responses = std::mem::replace(&mut harness.responses, tokio::sync::mpsc::channel(1).1);
    harness.stop().await;

    let message = responses.try_recv().expect("in-flight job finished before shutdown returned");
    assert!(ConfidenceResponse::from_message(&message).unwrap().data.success);
}

#[tokio::test]
async fn test_timed_out_extraction_leaves_no_workspace() {
    let mut harness =
        Harness::start(false, CountingOracle::new(0.75), Duration::from_millis(50)).await;
    harness.storage.insert(CONTAINER, DATA_URL, bulky_archive(20_000));

    harness.send(request("J1", "m1", None)).await;
    let response = harness.next_response().await;

    assert!(!response.data.success);
    assert!(response.data.message.contains("timed out"), "{}", response.data.message);
    assert_eq!(harness.workspace_count(), 0);

    // Extraction must not resume behind the teardown
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(harness.workspace_count(), 0);
    assert_eq!(harness.oracle.calls(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_slow_job_does_not_hold_up_others() {
    let mut harness =
        Harness::serving(CountingOracle::slow_for("J1", Duration::from_secs(1))).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    harness.send(request("J1", "m1", None)).await;
    harness.send(request("J2", "m2", None)).await;

    let first = harness.next_response().await;
    assert_eq!(first.job_id(), "J2");
    assert!(first.data.success, "{}", first.data.message);

    let second = harness.next_response().await;
    assert_eq!(second.job_id(), "J1");
    assert!(second.data.success, "{}", second.data.message);

    assert_eq!(harness.workspace_count(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_listener_keeps_reading_while_permits_are_taken() {
    let oracle = CountingOracle::slow_for("J1", Duration::from_millis(500));
    let mut harness = Harness::start_with(oracle, |config| config.max_concurrent_jobs = 1).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    harness.send(request("J1", "m1", None)).await;
    // J1 now holds the only permit
    while harness.oracle.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    harness.send(request("J1", "m1", None)).await;
    harness.send(request("J2", "m2", None)).await;
    harness.send(request("J2", "m2", None)).await;
    harness
        .send(QueueMessage::new("confidence-calculation", "bad-1", json!({"jobId": 5})))
        .await;

    // Rejections need no permit, so this one overtakes the running job
    let rejected = harness.next_response().await;
    assert_eq!(rejected.job_id(), "5");
    assert!(!rejected.data.success);

    let first = harness.next_response().await;
    assert_eq!(first.job_id(), "J1");
    assert!(first.data.success);

    let second = harness.next_response().await;
    assert_eq!(second.job_id(), "J2");
    assert!(second.data.success);

    harness.assert_no_response().await;
    assert_eq!(harness.oracle.calls(), 2);
    harness.stop().await;
}

#[tokio::test]
async fn test_concurrent_request_for_same_job_is_refused() {
    let mut harness =
        Harness::serving(CountingOracle::slow_for("J1", Duration::from_millis(500))).await;
    harness.storage.insert(CONTAINER, DATA_URL, archive(&[("nodes.geojson", NODES)]));

    harness.send(request("J1", "m1", None)).await;
    harness.send(request("J1", "m2", None)).await;

    let refused = harness.next_response().await;
    assert_eq!(refused.message_id, "m2");
    assert!(!refused.data.success);
    assert!(refused.data.message.contains("already being processed"), "{}", refused.data.message);

    let processed = harness.next_response().await;
    assert_eq!(processed.message_id, "m1");
    assert!(processed.data.success, "{}", processed.data.message);
    assert_eq!(harness.workspace_count(), 0);

    // The job id is free again once the first request is answered
    harness.send(request("J1", "m3", None)).await;
    let again = harness.next_response().await;
    assert_eq!(again.message_id, "m3");
    assert!(again.data.success, "{}", again.data.message);

    harness.stop().await;
}
