//! Device - leaf entity holding one scalar reading
//!
//! A device answers reads with its last recorded value (or none), records new
//! values, and stops for good when passivated.

mod core;
mod handle;
mod messages;

pub use core::Device;
pub use handle::DeviceHandle;
pub use messages::{DeviceCommand, RecordAck, RequestId, ValueReply};
