//! iotd - Hierarchical IoT Device Registry
//!
//! A registry of devices organized into groups, supervised by a single
//! manager. Callers can register devices, record and read temperatures, list
//! the devices of a group, and run a deadline-bounded aggregate read across a
//! whole group.
//!
//! # Core Concepts
//!
//! - **One task per entity**: devices, groups, the manager and each query
//!   coordinator run on their own tokio task and own their state
//! - **Message passing only**: entities talk through typed mailboxes, never
//!   shared memory
//! - **Termination-watch**: supervisors learn about stopped children through
//!   an explicit notice and reap registry entries only then
//! - **Degraded results, not errors**: a query always answers, marking each
//!   device `Value`, `Empty`, `Unavailable` or `TimedOut`
//!
//! # Modules
//!
//! - [`actor`] - Mailboxes, addresses, reply adapters and termination-watch
//! - [`device`] - Device entity holding the latest reading
//! - [`group`] - Group entity owning the devices of one group id
//! - [`manager`] - Manager entity owning every group
//! - [`query`] - Per-request scatter-gather coordinator
//! - [`supervisor`] - Application root
//! - [`events`] - Lifecycle event bus and JSONL event log
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod actor;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod group;
pub mod manager;
pub mod query;
pub mod supervisor;

// Re-export commonly used types
pub use actor::{ActorId, Addr, Mailbox, Recipient, ask, mailbox};
pub use config::Config;
pub use device::{Device, DeviceCommand, DeviceHandle, RecordAck, RequestId, ValueReply};
pub use error::{IotError, IotResult};
pub use events::{EventBus, EventLogEntry, EventLogger, IotEvent};
pub use group::{DeviceList, DeviceRegistered, Group, GroupCommand, GroupSettings, ListDevices, QueryAll, TrackDevice};
pub use manager::{Manager, ManagerCommand, ManagerHandle};
pub use query::{QueryResult, QuerySnapshot, QueryState, ReadingStatus};
pub use supervisor::Supervisor;
