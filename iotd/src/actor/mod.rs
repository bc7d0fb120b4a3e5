//! Message-passing primitives shared by every entity
//!
//! Each entity (device, group, manager, query coordinator) is a tokio task
//! draining its own [`Mailbox`]. Other entities only ever hold an [`Addr`] or a
//! [`Recipient`], so no state is shared between tasks.
//!
//! - **Addr:** cloneable, typed address of one running entity
//! - **Recipient:** reply address, optionally translating into another protocol
//! - **Termination-watch:** [`Addr::watch_with`] delivers a caller-chosen event
//!   once the watched entity has stopped

mod addr;
mod lifecycle;

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

pub use addr::{ActorId, Addr, Mailbox, Recipient, ask, mailbox};

/// Run one message handler, resuming the entity if it panics
///
/// The entity keeps whatever state it had before the failing message.
pub(crate) fn resume_on_panic<R>(entity: &str, handler: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(handler)) {
        Ok(result) => Some(result),
        Err(_) => {
            error!(%entity, "Message handler panicked, resuming with current state");
            None
        }
    }
}
