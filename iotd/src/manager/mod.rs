//! Manager - supervisor owning every group
//!
//! The manager creates groups lazily on first `TrackDevice`, routes requests
//! to them, and reaps a registry entry when its group stops. Read-only
//! requests for an unknown group are answered directly without creating it.

mod core;
mod handle;
mod messages;

pub use core::Manager;
pub use handle::ManagerHandle;
pub use messages::ManagerCommand;
