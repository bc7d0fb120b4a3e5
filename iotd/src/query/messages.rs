//! Query protocol and result types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceHandle, RequestId, ValueReply};

/// Outcome for one device in a finished query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "kebab-case")]
pub enum ReadingStatus {
    /// The device answered with a reading
    Value(f64),
    /// The device answered but has no reading yet
    Empty,
    /// The device stopped before answering
    Unavailable,
    /// The device did not answer before the deadline
    TimedOut,
}

/// Aggregate reply to a query; one status per snapshot device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueryResult {
    pub request_id: RequestId,
    pub statuses: BTreeMap<String, ReadingStatus>,
}

impl QueryResult {
    /// Result for a query over no devices
    pub fn empty(request_id: RequestId) -> Self {
        Self {
            request_id,
            statuses: BTreeMap::new(),
        }
    }

    /// Number of devices that resolved to `status`'s kind
    pub fn count(&self, status: &ReadingStatus) -> usize {
        let kind = std::mem::discriminant(status);
        self.statuses
            .values()
            .filter(|s| std::mem::discriminant(*s) == kind)
            .count()
    }
}

/// Devices a single query covers, frozen when the query starts
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot(BTreeMap<String, DeviceHandle>);

impl QuerySnapshot {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceHandle)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, DeviceHandle>> for QuerySnapshot {
    fn from(devices: BTreeMap<String, DeviceHandle>) -> Self {
        Self(devices)
    }
}

impl FromIterator<DeviceHandle> for QuerySnapshot {
    fn from_iter<I: IntoIterator<Item = DeviceHandle>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|device| (device.device_id().to_string(), device))
                .collect(),
        )
    }
}

/// Messages accepted by a query coordinator
#[derive(Debug)]
pub enum QueryCommand {
    /// A device's read reply, translated into the coordinator protocol
    WrappedValueReply(ValueReply),

    /// A snapshot device stopped
    DeviceTerminated { device_id: String },

    /// The collection deadline passed
    CollectionTimeout,
}
