//! Device actor implementation

use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{debug, info};

use super::handle::DeviceHandle;
use super::messages::{DeviceCommand, RecordAck, ValueReply};
use crate::actor::{Mailbox, mailbox, resume_on_panic};
use crate::events::{EventBus, IotEvent};

/// Leaf entity owning the last reading of one device
pub struct Device {
    group_id: String,
    device_id: String,
    last_value: Option<f64>,
    events: Arc<EventBus>,
}

impl Device {
    pub fn new(group_id: impl Into<String>, device_id: impl Into<String>, events: Arc<EventBus>) -> Self {
        Self {
            group_id: group_id.into(),
            device_id: device_id.into(),
            last_value: None,
            events,
        }
    }

    /// Spawn a standalone device task and return its handle
    pub fn spawn(group_id: impl Into<String>, device_id: impl Into<String>, events: Arc<EventBus>) -> DeviceHandle {
        let device = Self::new(group_id, device_id, events);
        let (addr, inbox) = mailbox();
        let handle = DeviceHandle::new(&device.group_id, &device.device_id, addr);
        tokio::spawn(device.run(inbox));
        handle
    }

    /// Run the device until passivated or every address is gone
    pub async fn run(mut self, mut inbox: Mailbox<DeviceCommand>) {
        info!(group_id = %self.group_id, device_id = %self.device_id, "Device actor started");

        while let Some(cmd) = inbox.recv().await {
            if let Some(ControlFlow::Break(())) = resume_on_panic("device", || self.handle(cmd)) {
                break;
            }
        }

        info!(group_id = %self.group_id, device_id = %self.device_id, "Device actor stopped");
    }

    fn handle(&mut self, cmd: DeviceCommand) -> ControlFlow<()> {
        match cmd {
            DeviceCommand::ReadValue { request_id, reply_to } => {
                debug!(device_id = %self.device_id, request_id, "Reading value");
                let reply = ValueReply {
                    request_id,
                    device_id: self.device_id.clone(),
                    value: self.last_value,
                };
                if reply_to.tell(reply).is_err() {
                    debug!(device_id = %self.device_id, request_id, "Reader gone, reply dropped");
                }
            }

            DeviceCommand::RecordValue {
                request_id,
                value,
                reply_to,
            } => {
                info!(device_id = %self.device_id, request_id, value, "Recorded reading");
                self.last_value = Some(value);
                self.events.emit(IotEvent::ValueRecorded {
                    group_id: self.group_id.clone(),
                    device_id: self.device_id.clone(),
                    value,
                });
                if reply_to.tell(RecordAck { request_id }).is_err() {
                    debug!(device_id = %self.device_id, request_id, "Recorder gone, ack dropped");
                }
            }

            DeviceCommand::Passivate => {
                info!(device_id = %self.device_id, "Passivating");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}
