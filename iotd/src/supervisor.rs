//! Application root - owns the manager task and the event bus

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::actor::mailbox;
use crate::config::Config;
use crate::error::{IotError, IotResult};
use crate::events::EventBus;
use crate::manager::{Manager, ManagerHandle};

/// Running registry: one manager and everything below it
pub struct Supervisor {
    manager: ManagerHandle,
    task: JoinHandle<()>,
    events: Arc<EventBus>,
    shutdown_timeout: Duration,
}

impl Supervisor {
    /// Start the manager on its own task
    pub fn start(config: &Config) -> Self {
        info!("Iot Application started");
        let events = Arc::new(EventBus::new(config.events.capacity));

        let (addr, inbox) = mailbox();
        let manager = Manager::new(config.group_settings(), events.clone());
        let task = tokio::spawn(manager.run(addr.clone(), inbox));

        Self {
            manager: ManagerHandle::new(addr, config.manager.ask_timeout(), config.query.timeout()),
            task,
            events,
            shutdown_timeout: config.supervisor.shutdown_timeout(),
        }
    }

    pub fn manager(&self) -> &ManagerHandle {
        &self.manager
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Stop the manager and wait for it, aborting after the grace period
    pub async fn shutdown(self) -> IotResult<()> {
        if self.manager.shutdown().is_err() {
            warn!("Manager already stopped before shutdown");
        }

        let mut task = self.task;
        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Manager task failed"),
            Err(_) => {
                warn!(timeout = ?self.shutdown_timeout, "Manager did not stop in time, aborting");
                task.abort();
                return Err(IotError::ShutdownTimeout(self.shutdown_timeout));
            }
        }

        info!("Iot Application stopped");
        Ok(())
    }
}
