//! Group protocol
//!
//! `TrackDevice`, `ListDevices` and `QueryAll` are also accepted by the
//! manager, which forwards them unchanged to the owning group.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, Recipient};
use crate::device::{DeviceHandle, RequestId};
use crate::query::QueryResult;

/// Register (or look up) a device in a group
#[derive(Debug)]
pub struct TrackDevice {
    pub group_id: String,
    pub device_id: String,
    pub reply_to: Recipient<DeviceRegistered>,
}

/// Reply to [`TrackDevice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistered {
    pub device: DeviceHandle,
}

/// Ask for the ids of every device currently known to a group
#[derive(Debug)]
pub struct ListDevices {
    pub request_id: RequestId,
    pub group_id: String,
    pub reply_to: Recipient<DeviceList>,
}

/// Reply to [`ListDevices`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceList {
    pub request_id: RequestId,
    pub ids: BTreeSet<String>,
}

/// Read every device of a group under a deadline
#[derive(Debug)]
pub struct QueryAll {
    pub request_id: RequestId,
    pub group_id: String,
    pub reply_to: Recipient<QueryResult>,
    /// Collection deadline; the group's default applies when absent
    pub timeout: Option<Duration>,
}

/// Sent by an idle group to its supervisor, which decides whether to stop it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIdle {
    pub group_id: String,
    pub actor_id: ActorId,
    /// `TrackDevice` requests the group had received when it went idle
    pub tracks_seen: u64,
}

/// Messages accepted by a group
#[derive(Debug)]
pub enum GroupCommand {
    TrackDevice(TrackDevice),
    ListDevices(ListDevices),
    QueryAll(QueryAll),

    /// A device worker stopped (internal)
    DeviceTerminated { device_id: String, actor_id: ActorId },

    /// The idle timer armed at `generation` fired (internal)
    IdleTimeout { generation: u64 },

    /// Stop the group and every device it owns
    Shutdown,
}
