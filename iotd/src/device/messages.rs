//! Device protocol

use serde::{Deserialize, Serialize};

use crate::actor::Recipient;

/// Caller-chosen correlation id carried by every request and its reply
pub type RequestId = u64;

/// Reply to [`DeviceCommand::ReadValue`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValueReply {
    pub request_id: RequestId,
    pub device_id: String,
    /// Last recorded reading, if any
    pub value: Option<f64>,
}

/// Acknowledgement of [`DeviceCommand::RecordValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RecordAck {
    pub request_id: RequestId,
}

/// Messages accepted by a device
#[derive(Debug)]
pub enum DeviceCommand {
    /// Report the last recorded reading
    ReadValue {
        request_id: RequestId,
        reply_to: Recipient<ValueReply>,
    },

    /// Store a new reading and acknowledge it
    RecordValue {
        request_id: RequestId,
        value: f64,
        reply_to: Recipient<RecordAck>,
    },

    /// Stop after everything queued before this message
    Passivate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_reply_serialization() {
        let reply = ValueReply {
            request_id: 3,
            device_id: "sensor-1".to_string(),
            value: None,
        };

        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains("request-id"));
        assert!(json.contains("device-id"));
        assert!(json.contains("null"));
    }
}
