//! Broadcast message format.
//!
//! Every data payload is a JSON object `{"type": <string>, "value": <any>}`.
//! Only `type == "heartbeat"` with a numeric value carries a sample; any other
//! type decodes fine and is left for the receiver to ignore.

use bytes::Bytes;
use heartsync_core::TransportError;
use serde::{Deserialize, Serialize};

pub const HEARTBEAT_TYPE: &str = "heartbeat";

/// Payloads above this size are rejected before parsing.
const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl DataMessage {
    pub fn new(kind: impl Into<String>, value: serde_json::Value) -> Self {
        Self { kind: kind.into(), value }
    }

    /// Non-finite values serialise as `null`.
    pub fn heartbeat(value: f64) -> Self {
        Self::new(HEARTBEAT_TYPE, serde_json::Value::from(value))
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind == HEARTBEAT_TYPE
    }

    /// Sample carried by a heartbeat message, passed through unvalidated.
    pub fn heartbeat_value(&self) -> Option<f64> {
        if self.is_heartbeat() {
            self.value.as_f64()
        } else {
            None
        }
    }

    pub fn encode(&self) -> Result<Bytes, TransportError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| TransportError::Malformed { reason: e.to_string() })
    }

    pub fn decode(payload: &[u8]) -> Result<Self, TransportError> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(TransportError::Malformed {
                reason: format!("payload too large: {} bytes", payload.len()),
            });
        }
        serde_json::from_slice(payload).map_err(|e| TransportError::Malformed { reason: e.to_string() })
    }
}
