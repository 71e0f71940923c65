//! Wire payloads sent to the bot endpoint

use homecord_core::EntityRecord;
use serde::{Deserialize, Serialize};

/// Discriminator value carried by delivery frames on the stream
pub const UPDATE_MESSAGE_TYPE: &str = "update";

/// One delivery: the target device and its entity records
///
/// Built fresh for every delivery and discarded afterwards, whether the
/// send worked or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub device_id: String,
    pub entities: Vec<EntityRecord>,
}

impl UpdatePayload {
    pub fn new(device_id: impl Into<String>, entities: Vec<EntityRecord>) -> Self {
        Self {
            device_id: device_id.into(),
            entities,
        }
    }
}

/// Envelope wrapping a payload on the streaming channel
///
/// The HTTP fallback posts the bare [`UpdatePayload`] instead; only the
/// stream carries the discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub data: UpdatePayload,
}

impl StreamEnvelope {
    /// Wrap a payload as an update frame
    pub fn update(data: UpdatePayload) -> Self {
        Self {
            message_type: UPDATE_MESSAGE_TYPE.to_string(),
            data,
        }
    }
}
