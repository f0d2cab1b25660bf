use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Envelope carried on the message bus
///
/// The envelope fields default to empty values so that a malformed payload can
/// still be correlated and answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl QueueMessage {
    pub fn new(
        message_type: impl Into<String>,
        message_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self { message_type: message_type.into(), message_id: message_id.into(), data }
    }

    /// Decode an envelope from raw JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode the envelope as JSON bytes
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
