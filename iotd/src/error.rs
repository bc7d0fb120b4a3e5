//! Error types shared by the registry entities

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to callers of the registry
///
/// Degraded query outcomes (`Empty`, `Unavailable`, `TimedOut`) are protocol
/// values, not errors. These variants only describe failures of the message
/// plumbing itself.
#[derive(Debug, Error)]
pub enum IotError {
    #[error("Mailbox closed: {0}")]
    MailboxClosed(String),

    #[error("Request dropped without a reply")]
    NoReply,

    #[error("No reply within {0:?}")]
    AskTimeout(Duration),

    #[error("Shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Result alias for registry operations
pub type IotResult<T> = Result<T, IotError>;
