use crate::error::{ConfidenceError, Result};
use crate::models::Credentials;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_APP_NAME: &str = "osw-confidence-service";
pub const DEFAULT_CONTAINER_NAME: &str = "osw";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_PORT: u16 = 8000;

/// What to do when the oracle fails on one sub-region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubRegionFailurePolicy {
    /// Fail the whole job
    #[default]
    Abort,
    /// Record a null score for that sub-region and keep going
    Isolate,
}

/// Service configuration, built once at startup and passed down explicitly
///
/// Values are layered: defaults, then an optional TOML file, then environment
/// variables. Each later layer overrides the earlier one.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub app_name: String,
    pub incoming_topic: String,
    pub incoming_subscription: String,
    pub outgoing_topic: String,
    pub container_name: String,
    pub credentials: Credentials,
    pub simulate: bool,
    pub download_root: PathBuf,
    pub max_concurrent_jobs: usize,
    pub job_timeout: Duration,
    pub sub_region_failures: SubRegionFailurePolicy,
    pub scoring_url: Option<String>,
    pub storage_root: Option<PathBuf>,
    /// Resolves container-relative blob references for HTTP storage
    pub storage_base_url: Option<String>,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ServiceConfig {
    /// Create a configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            incoming_topic: String::new(),
            incoming_subscription: String::new(),
            outgoing_topic: String::new(),
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            credentials: Credentials::default(),
            simulate: false,
            download_root: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            sub_region_failures: SubRegionFailurePolicy::Abort,
            scoring_url: None,
            storage_root: None,
            storage_base_url: None,
            port: DEFAULT_PORT,
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfidenceError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| ConfidenceError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(topic) = file_config.incoming_topic {
            self.incoming_topic = topic;
        }
        if let Some(subscription) = file_config.incoming_subscription {
            self.incoming_subscription = subscription;
        }
        if let Some(topic) = file_config.outgoing_topic {
            self.outgoing_topic = topic;
        }
        if let Some(container) = file_config.container_name {
            self.container_name = container;
        }
        if let Some(username) = file_config.username {
            self.credentials.username = username;
        }
        if let Some(password) = file_config.password {
            self.credentials.password = password;
        }
        if let Some(simulate) = file_config.simulate {
            self.simulate = simulate;
        }
        if let Some(root) = file_config.download_root {
            self.download_root = root;
        }
        if let Some(max_jobs) = file_config.max_concurrent_jobs {
            self.max_concurrent_jobs = max_jobs;
        }
        if let Some(secs) = file_config.job_timeout_secs {
            self.job_timeout = Duration::from_secs(secs);
        }
        if let Some(policy) = file_config.sub_region_failures {
            self.sub_region_failures = policy;
        }
        if file_config.scoring_url.is_some() {
            self.scoring_url = file_config.scoring_url;
        }
        if file_config.storage_root.is_some() {
            self.storage_root = file_config.storage_root;
        }
        if file_config.storage_base_url.is_some() {
            self.storage_base_url = file_config.storage_base_url;
        }
        if let Some(port) = file_config.port {
            self.port = port;
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(topic) = env::var("CONFIDENCE_REQ_TOPIC") {
            self.incoming_topic = topic;
        }
        if let Ok(subscription) = env::var("CONFIDENCE_REQ_SUB") {
            self.incoming_subscription = subscription;
        }
        if let Ok(topic) = env::var("CONFIDENCE_RES_TOPIC") {
            self.outgoing_topic = topic;
        }
        if let Ok(container) = env::var("CONTAINER_NAME") {
            self.container_name = container;
        }
        if let Ok(username) = env::var("OSM_USERNAME") {
            self.credentials.username = username;
        }
        if let Ok(password) = env::var("OSM_PASSWORD") {
            self.credentials.password = password;
        }

        // SIMULATE_METRIC: any non-empty value switches simulate mode on
        if let Ok(simulate) = env::var("SIMULATE_METRIC") {
            self.simulate = !simulate.trim().is_empty();
        }

        if let Ok(root) = env::var("CONFIDENCE_DOWNLOAD_DIR") {
            self.download_root = PathBuf::from(root);
        }

        if let Ok(max_jobs) = env::var("CONFIDENCE_MAX_JOBS") {
            match max_jobs.parse::<usize>() {
                Ok(n) if n > 0 => self.max_concurrent_jobs = n,
                _ => tracing::warn!(
                    "Invalid CONFIDENCE_MAX_JOBS value '{}': expected a positive integer",
                    max_jobs
                ),
            }
        }

        if let Ok(timeout) = env::var("CONFIDENCE_JOB_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) if secs > 0 => self.job_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(
                    "Invalid CONFIDENCE_JOB_TIMEOUT_SECS value '{}': expected a positive integer",
                    timeout
                ),
            }
        }

        if let Ok(policy) = env::var("CONFIDENCE_SUB_REGION_FAILURES") {
            match parse_failure_policy(&policy) {
                Ok(policy) => self.sub_region_failures = policy,
                Err(_) => tracing::warn!(
                    "Invalid CONFIDENCE_SUB_REGION_FAILURES value '{}': expected abort or isolate",
                    policy
                ),
            }
        }

        if let Ok(url) = env::var("CONFIDENCE_SCORING_URL") {
            self.scoring_url = Some(url).filter(|u| !u.is_empty());
        }

        if let Ok(root) = env::var("CONFIDENCE_STORAGE_DIR") {
            self.storage_root = Some(PathBuf::from(root)).filter(|p| !p.as_os_str().is_empty());
        }

        if let Ok(url) = env::var("CONFIDENCE_STORAGE_BASE_URL") {
            self.storage_base_url = Some(url).filter(|u| !u.is_empty());
        }

        if let Ok(port) = env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("Invalid PORT value '{}': expected a port number", port),
            }
        }

        self
    }

    /// Check that everything the intake loop needs is present
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfidenceError::ConfigInvalid {
                key: "max_concurrent_jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let required = [
            ("incoming_topic", &self.incoming_topic),
            ("incoming_subscription", &self.incoming_subscription),
            ("outgoing_topic", &self.outgoing_topic),
        ];
        for (key, value) in required {
            if value.is_empty() {
                return Err(ConfidenceError::ConfigMissing { key: key.to_string() });
            }
        }

        if !self.simulate && self.scoring_url.is_none() {
            return Err(ConfidenceError::ConfigMissing { key: "scoring_url".to_string() });
        }

        Ok(())
    }

    /// Whether jobs short-circuit to the canned result
    pub fn is_simulated(&self) -> bool {
        self.simulate
    }

    /// Directory that holds the workspace of a single job
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.download_root.join(job_id)
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    incoming_topic: Option<String>,
    incoming_subscription: Option<String>,
    outgoing_topic: Option<String>,
    container_name: Option<String>,
    username: Option<String>,
    password: Option<String>,
    simulate: Option<bool>,
    download_root: Option<PathBuf>,
    max_concurrent_jobs: Option<usize>,
    job_timeout_secs: Option<u64>,
    sub_region_failures: Option<SubRegionFailurePolicy>,
    scoring_url: Option<String>,
    storage_root: Option<PathBuf>,
    storage_base_url: Option<String>,
    port: Option<u16>,
}

/// Parse sub-region failure policy from string
pub fn parse_failure_policy(s: &str) -> Result<SubRegionFailurePolicy> {
    match s.trim().to_lowercase().as_str() {
        "abort" => Ok(SubRegionFailurePolicy::Abort),
        "isolate" => Ok(SubRegionFailurePolicy::Isolate),
        _ => Err(ConfidenceError::ConfigInvalid {
            key: "sub_region_failures".to_string(),
            reason: format!("Invalid failure policy: {}. Use abort or isolate", s),
        }),
    }
}
