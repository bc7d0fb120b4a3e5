//! Query coordinator - deadline-bounded scatter-gather over a device snapshot
//!
//! A group spawns one [`QueryCoordinator`] per aggregate read. The coordinator
//! resolves every device in its [`QuerySnapshot`] to exactly one
//! [`ReadingStatus`]:
//! - **Value / Empty:** the device answered (with or without a reading)
//! - **Unavailable:** the device stopped before answering
//! - **TimedOut:** the deadline passed first

mod core;
mod messages;
mod state;

pub use core::QueryCoordinator;
pub use messages::{QueryCommand, QueryResult, QuerySnapshot, ReadingStatus};
pub use state::QueryState;
