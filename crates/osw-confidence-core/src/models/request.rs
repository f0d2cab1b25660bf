use serde::{Deserialize, Serialize};

use crate::error::{ConfidenceError, Result};
use crate::models::QueueMessage;

/// Payload of a confidence calculation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub data_file: String,
    pub meta_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_regions_file: Option<String>,
    pub trigger_type: String,
}

/// Typed confidence calculation request, decoded from a bus message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceRequest {
    pub message_type: String,
    pub message_id: String,
    pub data: RequestData,
}

impl ConfidenceRequest {
    /// Decode and validate a request from a bus message
    pub fn from_message(msg: &QueueMessage) -> Result<Self> {
        let data: RequestData = serde_json::from_value(msg.data.clone())
            .map_err(|e| ConfidenceError::Intake { reason: e.to_string() })?;

        if data.job_id.trim().is_empty() {
            return Err(ConfidenceError::Intake { reason: "jobId is empty".to_string() });
        }
        if data.data_file.trim().is_empty() {
            return Err(ConfidenceError::Intake { reason: "data_file is empty".to_string() });
        }

        Ok(Self {
            message_type: msg.message_type.clone(),
            message_id: msg.message_id.clone(),
            data,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.data.job_id
    }

    /// Sub-regions file reference; an empty string counts as absent
    pub fn sub_regions_file(&self) -> Option<&str> {
        self.data.sub_regions_file.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }
}

/// Best-effort job id extraction from a message that failed to decode
///
/// Accepts string and numeric ids so that a failure response can still be
/// correlated by the caller.
pub fn recover_job_id(msg: &QueueMessage) -> Option<String> {
    match msg.data.get("jobId")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
