//! Group - supervisor owning every device of one group id
//!
//! The group creates devices lazily on first `TrackDevice`, watches each one,
//! and removes a registry entry only when that worker has stopped. Aggregate
//! reads are delegated to a fresh query coordinator per request.

mod core;
mod messages;

pub use core::{Group, GroupSettings};
pub use messages::{DeviceList, DeviceRegistered, GroupCommand, GroupIdle, ListDevices, QueryAll, TrackDevice};
