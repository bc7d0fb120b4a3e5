//! DeviceHandle - address plus identity of a device worker

use std::time::Duration;

use tracing::debug;

use super::messages::{DeviceCommand, RecordAck, RequestId, ValueReply};
use crate::actor::{ActorId, Addr, ask};
use crate::error::IotResult;

/// Handle returned on registration; equal only for the same worker instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    group_id: String,
    device_id: String,
    addr: Addr<DeviceCommand>,
}

impl DeviceHandle {
    pub fn new(group_id: impl Into<String>, device_id: impl Into<String>, addr: Addr<DeviceCommand>) -> Self {
        Self {
            group_id: group_id.into(),
            device_id: device_id.into(),
            addr,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Identity of the worker behind this handle
    pub fn id(&self) -> ActorId {
        self.addr.id()
    }

    pub fn addr(&self) -> &Addr<DeviceCommand> {
        &self.addr
    }

    pub fn is_stopped(&self) -> bool {
        self.addr.is_stopped()
    }

    /// Read the last recorded value
    pub async fn read(&self, request_id: RequestId, timeout: Duration) -> IotResult<ValueReply> {
        debug!(device_id = %self.device_id, request_id, "DeviceHandle::read: called");
        ask(&self.addr, timeout, |reply_to| DeviceCommand::ReadValue { request_id, reply_to }).await
    }

    /// Record a new value and wait for the acknowledgement
    pub async fn record(&self, request_id: RequestId, value: f64, timeout: Duration) -> IotResult<RecordAck> {
        debug!(device_id = %self.device_id, request_id, value, "DeviceHandle::record: called");
        ask(&self.addr, timeout, |reply_to| DeviceCommand::RecordValue {
            request_id,
            value,
            reply_to,
        })
        .await
    }

    /// Ask the device to stop once its queued messages are processed
    pub fn passivate(&self) -> IotResult<()> {
        debug!(device_id = %self.device_id, "DeviceHandle::passivate: called");
        self.addr.tell(DeviceCommand::Passivate)
    }
}
