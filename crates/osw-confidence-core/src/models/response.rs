use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ConfidenceRequest, QueueMessage};

pub const SUCCESS_MESSAGE: &str = "Processed successfully";

/// Terminal job status reported over the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Finished,
}

/// Payload of a confidence calculation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub confidence_scores: Option<FeatureCollection>,
    pub confidence_library_version: String,
    pub status: JobStatus,
    pub message: String,
    pub success: bool,
}

/// Response published once per accepted request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceResponse {
    pub message_type: String,
    pub message_id: String,
    pub data: ResponseData,
}

impl ConfidenceResponse {
    /// Successful response carrying the scored feature collection
    pub fn success(
        request: &ConfidenceRequest,
        scores: FeatureCollection,
        library_version: impl Into<String>,
    ) -> Self {
        Self {
            message_type: request.message_type.clone(),
            message_id: request.message_id.clone(),
            data: ResponseData {
                job_id: request.data.job_id.clone(),
                confidence_scores: Some(scores),
                confidence_library_version: library_version.into(),
                status: JobStatus::Finished,
                message: SUCCESS_MESSAGE.to_string(),
                success: true,
            },
        }
    }

    /// Failure response; `message` is surfaced to the caller verbatim
    pub fn failure(
        message_type: impl Into<String>,
        message_id: impl Into<String>,
        job_id: impl Into<String>,
        message: impl Into<String>,
        library_version: impl Into<String>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            message_id: message_id.into(),
            data: ResponseData {
                job_id: job_id.into(),
                confidence_scores: None,
                confidence_library_version: library_version.into(),
                status: JobStatus::Finished,
                message: message.into(),
                success: false,
            },
        }
    }

    pub fn job_id(&self) -> &str {
        &self.data.job_id
    }

    /// Wrap the response in a bus envelope
    pub fn to_message(&self) -> Result<QueueMessage> {
        Ok(QueueMessage::new(
            self.message_type.clone(),
            self.message_id.clone(),
            serde_json::to_value(&self.data)?,
        ))
    }

    /// Decode a response from a bus envelope
    pub fn from_message(msg: &QueueMessage) -> Result<Self> {
        Ok(Self {
            message_type: msg.message_type.clone(),
            message_id: msg.message_id.clone(),
            data: serde_json::from_value(msg.data.clone())?,
        })
    }
}
