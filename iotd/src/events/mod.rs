//! Lifecycle telemetry for the registry
//!
//! Entities emit fire-and-forget notices onto a broadcast [`EventBus`]; the
//! [`EventLogger`] (or any other subscriber) consumes them. The bus is never
//! on a reply path: emitting cannot fail or block.

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, create_event_bus};
pub use logger::{EventLogger, read_events, spawn_event_logger};
pub use types::{EventLogEntry, IotEvent};
