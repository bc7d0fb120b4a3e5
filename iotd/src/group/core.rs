//! Group actor implementation

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::messages::{DeviceList, DeviceRegistered, GroupCommand, GroupIdle, ListDevices, QueryAll, TrackDevice};
use crate::actor::{ActorId, Addr, Mailbox, Recipient, mailbox, resume_on_panic};
use crate::device::{Device, DeviceHandle};
use crate::events::{EventBus, IotEvent};
use crate::query::{QueryCoordinator, QuerySnapshot};

/// Runtime settings shared by every group of a manager
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSettings {
    /// Deadline for `QueryAll` requests that carry none
    pub query_timeout: Duration,
    /// Treat the group as idle once its registry has been empty this long
    pub idle_timeout: Option<Duration>,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(3),
            idle_timeout: None,
        }
    }
}

/// Supervisor for the devices of one group id
pub struct Group {
    group_id: String,
    settings: GroupSettings,
    devices: BTreeMap<String, DeviceHandle>,
    /// Device tasks; dropping the set stops every device
    children: JoinSet<()>,
    idle_generation: u64,
    tracks_seen: u64,
    /// Receives idle notices; without one the group stops itself when idle
    supervisor: Option<Recipient<GroupIdle>>,
    events: Arc<EventBus>,
}

impl Group {
    pub fn new(group_id: impl Into<String>, settings: GroupSettings, events: Arc<EventBus>) -> Self {
        Self {
            group_id: group_id.into(),
            settings,
            devices: BTreeMap::new(),
            children: JoinSet::new(),
            idle_generation: 0,
            tracks_seen: 0,
            supervisor: None,
            events,
        }
    }

    /// Leave the idle-stop decision to `supervisor`
    ///
    /// The supervisor routes requests to this group, so only it can stop the
    /// group without losing a request already forwarded.
    pub fn with_supervisor(mut self, supervisor: Recipient<GroupIdle>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Spawn a standalone group task and return its address
    pub fn spawn(group_id: impl Into<String>, settings: GroupSettings, events: Arc<EventBus>) -> Addr<GroupCommand> {
        let (addr, inbox) = mailbox();
        let group = Self::new(group_id, settings, events);
        tokio::spawn(group.run(addr.clone(), inbox));
        addr
    }

    /// Run the group until shut down, idle-reaped, or every address is gone
    pub async fn run(mut self, me: Addr<GroupCommand>, mut inbox: Mailbox<GroupCommand>) {
        info!(group_id = %self.group_id, "DeviceGroup started");
        self.arm_idle_timer(&me);

        loop {
            tokio::select! {
                cmd = inbox.recv() => {
                    let Some(cmd) = cmd else { break };
                    if let Some(ControlFlow::Break(())) = resume_on_panic("group", || self.handle(&me, cmd)) {
                        break;
                    }
                }
                Some(joined) = self.children.join_next(), if !self.children.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        error!(group_id = %self.group_id, error = %e, "Device task panicked");
                    }
                }
            }
        }

        self.children.abort_all();
        info!(group_id = %self.group_id, devices = self.devices.len(), "DeviceGroup stopped");
    }

    fn handle(&mut self, me: &Addr<GroupCommand>, cmd: GroupCommand) -> ControlFlow<()> {
        match cmd {
            GroupCommand::TrackDevice(request) => self.on_track_device(me, request),

            GroupCommand::ListDevices(request) if request.group_id == self.group_id => self.on_device_list(request),

            GroupCommand::QueryAll(request) if request.group_id == self.group_id => self.on_query_all(request),

            GroupCommand::ListDevices(request) => {
                debug!(
                    group_id = %self.group_id,
                    requested = %request.group_id,
                    "Ignoring ListDevices for another group"
                );
            }

            GroupCommand::QueryAll(request) => {
                info!(
                    group_id = %self.group_id,
                    requested = %request.group_id,
                    "Ignoring QueryAll for another group"
                );
            }

            GroupCommand::DeviceTerminated { device_id, actor_id } => self.on_terminated(me, device_id, actor_id),

            GroupCommand::IdleTimeout { generation } => {
                if generation == self.idle_generation && self.devices.is_empty() {
                    match &self.supervisor {
                        Some(supervisor) => {
                            info!(group_id = %self.group_id, "DeviceGroup idle, notifying supervisor");
                            let _ = supervisor.tell(GroupIdle {
                                group_id: self.group_id.clone(),
                                actor_id: me.id(),
                                tracks_seen: self.tracks_seen,
                            });
                        }
                        None => {
                            info!(group_id = %self.group_id, "DeviceGroup idle, stopping");
                            return ControlFlow::Break(());
                        }
                    }
                }
            }

            GroupCommand::Shutdown => {
                info!(group_id = %self.group_id, "DeviceGroup shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn on_track_device(&mut self, me: &Addr<GroupCommand>, request: TrackDevice) {
        self.tracks_seen += 1;
        if request.group_id != self.group_id {
            info!(
                "Ignoring TrackDevice request for {}. This actor is responsible for {}.",
                request.group_id, self.group_id
            );
            return;
        }

        // A stopped worker whose termination notice is still queued does not count
        if let Some(existing) = self.devices.get(&request.device_id)
            && !existing.is_stopped()
        {
            let _ = request.reply_to.tell(DeviceRegistered {
                device: existing.clone(),
            });
            return;
        }

        info!(group_id = %self.group_id, device_id = %request.device_id, "Creating device actor");
        let device = Device::new(&self.group_id, &request.device_id, self.events.clone());
        let (addr, inbox) = mailbox();
        addr.watch_with(
            me.recipient(),
            GroupCommand::DeviceTerminated {
                device_id: request.device_id.clone(),
                actor_id: addr.id(),
            },
        );
        self.children.spawn(device.run(inbox));

        let handle = DeviceHandle::new(&self.group_id, &request.device_id, addr);
        self.devices.insert(request.device_id.clone(), handle.clone());
        self.idle_generation += 1;

        self.events.emit(IotEvent::DeviceStarted {
            group_id: self.group_id.clone(),
            device_id: request.device_id,
        });
        let _ = request.reply_to.tell(DeviceRegistered { device: handle });
    }

    fn on_device_list(&self, request: ListDevices) {
        let reply = DeviceList {
            request_id: request.request_id,
            ids: self.devices.keys().cloned().collect(),
        };
        let _ = request.reply_to.tell(reply);
    }

    fn on_query_all(&self, request: QueryAll) {
        let snapshot = QuerySnapshot::from(self.devices.clone());
        let timeout = request.timeout.unwrap_or(self.settings.query_timeout);
        // The coordinator is self-contained from here on
        QueryCoordinator::spawn(
            &self.group_id,
            snapshot,
            request.request_id,
            request.reply_to,
            timeout,
            self.events.clone(),
        );
    }

    fn on_terminated(&mut self, me: &Addr<GroupCommand>, device_id: String, actor_id: ActorId) {
        match self.devices.get(&device_id) {
            Some(handle) if handle.id() == actor_id => {
                info!(group_id = %self.group_id, %device_id, "Device actor has been terminated");
                self.devices.remove(&device_id);
                self.events.emit(IotEvent::DeviceStopped {
                    group_id: self.group_id.clone(),
                    device_id,
                });
                if self.devices.is_empty() {
                    self.arm_idle_timer(me);
                }
            }
            _ => {
                // Registry already points at a replacement
                debug!(group_id = %self.group_id, %device_id, "Replaced device worker has been terminated");
                self.events.emit(IotEvent::DeviceStopped {
                    group_id: self.group_id.clone(),
                    device_id,
                });
            }
        }
    }

    fn arm_idle_timer(&mut self, me: &Addr<GroupCommand>) {
        let Some(idle) = self.settings.idle_timeout else {
            return;
        };
        self.idle_generation += 1;
        let generation = self.idle_generation;
        let me = me.clone();
        tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let _ = me.tell(GroupCommand::IdleTimeout { generation });
        });
    }
}
