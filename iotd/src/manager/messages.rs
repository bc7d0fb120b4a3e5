//! Manager protocol

use crate::actor::ActorId;
use crate::group::{GroupIdle, ListDevices, QueryAll, TrackDevice};

/// Messages accepted by the manager
#[derive(Debug)]
pub enum ManagerCommand {
    /// Create the group on first sight, then forward unchanged
    TrackDevice(TrackDevice),

    /// Forward to the group, or answer with an empty list for an unseen group
    ListDevices(ListDevices),

    /// Forward to the group, or answer with an empty result for an unseen group
    QueryAll(QueryAll),

    /// A group has had no devices for its idle timeout (internal)
    GroupIdle(GroupIdle),

    /// A group worker stopped (internal)
    GroupTerminated { group_id: String, actor_id: ActorId },

    /// Stop one group and every device it owns
    StopGroup { group_id: String },

    /// Stop the manager and, transitively, everything below it
    Shutdown,
}
