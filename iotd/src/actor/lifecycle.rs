//! Termination-watch subscription table
//!
//! Every mailbox owns one `Lifecycle`. Watchers register a notification that
//! fires exactly once, when the mailbox is dropped. Registering on an already
//! stopped lifecycle fires immediately.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// A registered interest in another entity's termination
pub(crate) struct Watcher {
    notify: Box<dyn FnOnce() + Send>,
    closed: Box<dyn Fn() -> bool + Send>,
}

impl Watcher {
    pub(crate) fn new(notify: impl FnOnce() + Send + 'static, closed: impl Fn() -> bool + Send + 'static) -> Self {
        Self {
            notify: Box::new(notify),
            closed: Box::new(closed),
        }
    }
}

enum State {
    Running(Vec<Watcher>),
    Stopped,
}

pub(crate) struct Lifecycle {
    state: Mutex<State>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::Running(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        matches!(*self.lock(), State::Stopped)
    }

    /// Register a watcher, or notify it right away if already stopped
    pub(crate) fn subscribe(&self, watcher: Watcher) {
        let mut state = self.lock();
        if let State::Running(watchers) = &mut *state {
            // Watchers whose own mailbox is gone will never read the notice
            watchers.retain(|w| !(w.closed)());
            watchers.push(watcher);
            return;
        }
        drop(state);

        debug!("Lifecycle::subscribe: target already stopped, notifying immediately");
        (watcher.notify)();
    }

    /// Mark stopped and notify every registered watcher
    pub(crate) fn terminate(&self) {
        let previous = std::mem::replace(&mut *self.lock(), State::Stopped);
        if let State::Running(watchers) = previous {
            debug!(count = watchers.len(), "Lifecycle::terminate: notifying watchers");
            for watcher in watchers {
                (watcher.notify)();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        match &*self.lock() {
            State::Running(watchers) => watchers.len(),
            State::Stopped => 0,
        }
    }
}
