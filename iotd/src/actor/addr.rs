//! Addresses, mailboxes and reply recipients

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::lifecycle::{Lifecycle, Watcher};
use crate::error::{IotError, IotResult};

/// Unique identity of one running entity instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Create a new unbounded mailbox and the address that feeds it
pub fn mailbox<M>() -> (Addr<M>, Mailbox<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let lifecycle = Arc::new(Lifecycle::new());
    let id = ActorId::new();
    (
        Addr {
            id,
            tx,
            lifecycle: lifecycle.clone(),
        },
        Mailbox { id, rx, lifecycle },
    )
}

/// Receiving end owned by the running entity
///
/// Dropping the mailbox stops the entity: pending messages are discarded and
/// every termination watcher is notified.
pub struct Mailbox<M> {
    id: ActorId,
    rx: mpsc::UnboundedReceiver<M>,
    lifecycle: Arc<Lifecycle>,
}

impl<M> Mailbox<M> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Receive the next message, or None once every address is gone
    pub async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Receive without waiting
    pub fn try_recv(&mut self) -> Option<M> {
        self.rx.try_recv().ok()
    }
}

impl<M> Drop for Mailbox<M> {
    fn drop(&mut self) {
        self.rx.close();
        self.lifecycle.terminate();
    }
}

/// Cloneable address of a running entity
pub struct Addr<M> {
    id: ActorId,
    tx: mpsc::UnboundedSender<M>,
    lifecycle: Arc<Lifecycle>,
}

impl<M> Addr<M> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Fire-and-forget send
    pub fn tell(&self, msg: M) -> IotResult<()> {
        self.tx
            .send(msg)
            .map_err(|_| IotError::MailboxClosed(self.id.to_string()))
    }

    /// True once the entity behind this address has stopped
    pub fn is_stopped(&self) -> bool {
        self.lifecycle.is_stopped()
    }

    /// Reply address delivering `M` unchanged
    pub fn recipient(&self) -> Recipient<M>
    where
        M: Send + 'static,
    {
        self.adapter(|msg| msg)
    }

    /// Reply address that translates `N` into this entity's own protocol
    pub fn adapter<N, F>(&self, map: F) -> Recipient<N>
    where
        M: Send + 'static,
        F: Fn(N) -> M + Send + Sync + 'static,
    {
        Recipient {
            target: self.id,
            sink: Arc::new(Forward { tx: self.tx.clone(), map }),
        }
    }

    /// Deliver `event` to `watcher` when this entity stops
    ///
    /// If the entity has already stopped, the event is delivered immediately.
    pub fn watch_with<N>(&self, watcher: Recipient<N>, event: N)
    where
        N: Send + 'static,
    {
        debug!(target_id = %self.id, watcher_id = %watcher.target, "Addr::watch_with: called");
        let observer = watcher.clone();
        self.lifecycle.subscribe(Watcher::new(
            move || {
                if watcher.tell(event).is_err() {
                    debug!(watcher_id = %watcher.target, "termination notice dropped, watcher already stopped");
                }
            },
            move || observer.is_closed(),
        ));
    }
}

impl<M> Clone for Addr<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<M> PartialEq for Addr<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M> Eq for Addr<M> {}

impl<M> Hash for Addr<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<M> fmt::Debug for Addr<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Addr").field("id", &self.id).finish()
    }
}

trait Sink<M>: Send + Sync {
    fn send(&self, msg: M) -> bool;
    fn is_closed(&self) -> bool;
}

struct Forward<N, F> {
    tx: mpsc::UnboundedSender<N>,
    map: F,
}

impl<M, N, F> Sink<M> for Forward<N, F>
where
    N: Send,
    F: Fn(M) -> N + Send + Sync,
{
    fn send(&self, msg: M) -> bool {
        self.tx.send((self.map)(msg)).is_ok()
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Type-erased reply address
pub struct Recipient<M> {
    target: ActorId,
    sink: Arc<dyn Sink<M>>,
}

impl<M> Recipient<M> {
    /// Identity of the entity that ultimately receives the message
    pub fn target(&self) -> ActorId {
        self.target
    }

    pub fn tell(&self, msg: M) -> IotResult<()> {
        if self.sink.send(msg) {
            Ok(())
        } else {
            Err(IotError::MailboxClosed(self.target.to_string()))
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }
}

impl<M> Clone for Recipient<M> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            sink: self.sink.clone(),
        }
    }
}

impl<M> fmt::Debug for Recipient<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipient").field("target", &self.target).finish()
    }
}

/// Send a request built around a fresh reply address and wait for the answer
///
/// Returns `NoReply` as soon as the request is dropped unanswered, and
/// `AskTimeout` if nothing arrives within `timeout`.
pub async fn ask<M, R, F>(addr: &Addr<M>, timeout: Duration, make: F) -> IotResult<R>
where
    M: Send + 'static,
    R: Send + 'static,
    F: FnOnce(Recipient<R>) -> M,
{
    let (reply_addr, mut replies) = mailbox::<R>();
    addr.tell(make(reply_addr.recipient()))?;
    drop(reply_addr);

    match tokio::time::timeout(timeout, replies.recv()).await {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => Err(IotError::NoReply),
        Err(_) => Err(IotError::AskTimeout(timeout)),
    }
}
