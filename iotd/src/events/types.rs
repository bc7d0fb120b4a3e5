//! Event types for registry lifecycle telemetry
//!
//! These events describe what happened inside the registry:
//! - Group lifecycle (started, stopped)
//! - Device lifecycle (started, stopped, value recorded)
//! - Aggregate queries (completed, with per-status counts)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Core event enum - the vocabulary of registry activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IotEvent {
    // === Group Lifecycle ===
    /// A group worker was created by the manager
    GroupStarted { group_id: String },
    /// A group worker stopped and was reaped by the manager
    GroupStopped { group_id: String },

    // === Device Lifecycle ===
    /// A device worker was created by its group
    DeviceStarted { group_id: String, device_id: String },
    /// A device worker stopped and was reaped by its group
    DeviceStopped { group_id: String, device_id: String },
    /// A device stored a new reading
    ValueRecorded {
        group_id: String,
        device_id: String,
        value: f64,
    },

    // === Queries ===
    /// An aggregate query delivered its result
    QueryCompleted {
        group_id: String,
        request_id: u64,
        devices: usize,
        timed_out: usize,
        unavailable: usize,
    },
}

impl IotEvent {
    /// Get the group id this event belongs to
    pub fn group_id(&self) -> &str {
        match self {
            IotEvent::GroupStarted { group_id }
            | IotEvent::GroupStopped { group_id }
            | IotEvent::DeviceStarted { group_id, .. }
            | IotEvent::DeviceStopped { group_id, .. }
            | IotEvent::ValueRecorded { group_id, .. }
            | IotEvent::QueryCompleted { group_id, .. } => group_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            IotEvent::GroupStarted { .. } => "GroupStarted",
            IotEvent::GroupStopped { .. } => "GroupStopped",
            IotEvent::DeviceStarted { .. } => "DeviceStarted",
            IotEvent::DeviceStopped { .. } => "DeviceStopped",
            IotEvent::ValueRecorded { .. } => "ValueRecorded",
            IotEvent::QueryCompleted { .. } => "QueryCompleted",
        }
    }
}

/// Log entry wrapper with timestamp
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Timestamp of the event
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: IotEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: IotEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_group_id() {
        let event = IotEvent::DeviceStarted {
            group_id: "floor-1".to_string(),
            device_id: "sensor-a".to_string(),
        };
        assert_eq!(event.group_id(), "floor-1");
        assert_eq!(event.event_type(), "DeviceStarted");
    }

    #[test]
    fn test_event_log_entry_serialization() {
        let entry = EventLogEntry::new(IotEvent::QueryCompleted {
            group_id: "floor-1".to_string(),
            request_id: 7,
            devices: 3,
            timed_out: 1,
            unavailable: 0,
        });

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"ts\""));
        assert!(json.contains("\"type\":\"QueryCompleted\""));

        let parsed: EventLogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event, entry.event);
    }
}
