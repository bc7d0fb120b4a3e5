//! ManagerHandle - async facade over the manager mailbox

use std::time::Duration;

use tracing::debug;

use super::messages::ManagerCommand;
use crate::actor::{Addr, ask};
use crate::device::{DeviceHandle, RequestId};
use crate::error::IotResult;
use crate::group::{DeviceList, ListDevices, QueryAll, TrackDevice};
use crate::query::QueryResult;

/// Cloneable handle used by callers outside the entity tree
#[derive(Clone, Debug)]
pub struct ManagerHandle {
    addr: Addr<ManagerCommand>,
    ask_timeout: Duration,
    query_timeout: Duration,
}

impl ManagerHandle {
    /// `query_timeout` must match the groups' default so that `query_all`
    /// waits long enough for a query without an explicit deadline
    pub fn new(addr: Addr<ManagerCommand>, ask_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            addr,
            ask_timeout,
            query_timeout,
        }
    }

    pub fn addr(&self) -> &Addr<ManagerCommand> {
        &self.addr
    }

    pub fn is_stopped(&self) -> bool {
        self.addr.is_stopped()
    }

    /// Register a device, creating its group on first use
    pub async fn track_device(&self, group_id: &str, device_id: &str) -> IotResult<DeviceHandle> {
        debug!(%group_id, %device_id, "ManagerHandle::track_device: called");
        let registered = ask(&self.addr, self.ask_timeout, |reply_to| {
            ManagerCommand::TrackDevice(TrackDevice {
                group_id: group_id.to_string(),
                device_id: device_id.to_string(),
                reply_to,
            })
        })
        .await?;
        Ok(registered.device)
    }

    /// Ids of the devices currently registered in `group_id`
    pub async fn list_devices(&self, request_id: RequestId, group_id: &str) -> IotResult<DeviceList> {
        debug!(%group_id, request_id, "ManagerHandle::list_devices: called");
        ask(&self.addr, self.ask_timeout, |reply_to| {
            ManagerCommand::ListDevices(ListDevices {
                request_id,
                group_id: group_id.to_string(),
                reply_to,
            })
        })
        .await
    }

    /// Aggregate read of every device in `group_id`
    ///
    /// `timeout` overrides the group's default collection deadline.
    pub async fn query_all(
        &self,
        request_id: RequestId,
        group_id: &str,
        timeout: Option<Duration>,
    ) -> IotResult<QueryResult> {
        debug!(%group_id, request_id, ?timeout, "ManagerHandle::query_all: called");
        let wait = timeout.unwrap_or(self.query_timeout) + self.ask_timeout;
        ask(&self.addr, wait, |reply_to| {
            ManagerCommand::QueryAll(QueryAll {
                request_id,
                group_id: group_id.to_string(),
                reply_to,
                timeout,
            })
        })
        .await
    }

    /// Stop one group and its devices
    pub fn stop_group(&self, group_id: &str) -> IotResult<()> {
        debug!(%group_id, "ManagerHandle::stop_group: called");
        self.addr.tell(ManagerCommand::StopGroup {
            group_id: group_id.to_string(),
        })
    }

    /// Ask the manager to stop
    pub fn shutdown(&self) -> IotResult<()> {
        debug!("ManagerHandle::shutdown: called");
        self.addr.tell(ManagerCommand::Shutdown)
    }
}
