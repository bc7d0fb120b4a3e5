//! Manager actor implementation

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::messages::ManagerCommand;
use crate::actor::{ActorId, Addr, Mailbox, mailbox, resume_on_panic};
use crate::events::{EventBus, IotEvent};
use crate::group::{DeviceList, Group, GroupCommand, GroupIdle, GroupSettings, ListDevices, QueryAll, TrackDevice};
use crate::query::QueryResult;

/// Top-level registry of groups
pub struct Manager {
    group_settings: GroupSettings,
    groups: BTreeMap<String, Addr<GroupCommand>>,
    /// Groups sent `Shutdown` whose termination notice has not arrived yet
    stopping: BTreeSet<ActorId>,
    /// `TrackDevice` requests forwarded to each running group
    tracks_forwarded: BTreeMap<ActorId, u64>,
    /// Group tasks; dropping the set stops every group
    children: JoinSet<()>,
    events: Arc<EventBus>,
}

impl Manager {
    pub fn new(group_settings: GroupSettings, events: Arc<EventBus>) -> Self {
        Self {
            group_settings,
            groups: BTreeMap::new(),
            stopping: BTreeSet::new(),
            tracks_forwarded: BTreeMap::new(),
            children: JoinSet::new(),
            events,
        }
    }

    /// Run the manager until shut down
    pub async fn run(mut self, me: Addr<ManagerCommand>, mut inbox: Mailbox<ManagerCommand>) {
        info!("DeviceManager started");

        loop {
            tokio::select! {
                cmd = inbox.recv() => {
                    let Some(cmd) = cmd else { break };
                    if let Some(ControlFlow::Break(())) = resume_on_panic("manager", || self.handle(&me, cmd)) {
                        break;
                    }
                }
                Some(joined) = self.children.join_next(), if !self.children.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        error!(error = %e, "Group task panicked");
                    }
                }
            }
        }

        self.children.abort_all();
        info!(groups = self.groups.len(), "DeviceManager stopped");
    }

    fn handle(&mut self, me: &Addr<ManagerCommand>, cmd: ManagerCommand) -> ControlFlow<()> {
        match cmd {
            ManagerCommand::TrackDevice(request) => self.on_track_device(me, request),
            ManagerCommand::ListDevices(request) => self.on_device_list(request),
            ManagerCommand::QueryAll(request) => self.on_query_all(request),
            ManagerCommand::GroupTerminated { group_id, actor_id } => self.on_group_terminated(group_id, actor_id),

            ManagerCommand::GroupIdle(idle) => self.on_group_idle(idle),

            ManagerCommand::StopGroup { group_id } => {
                if self.live_group(&group_id).is_some() {
                    info!(%group_id, "Stopping device group");
                    self.stop_group(&group_id);
                } else {
                    debug!(%group_id, "StopGroup for unknown group");
                }
            }

            ManagerCommand::Shutdown => {
                info!("DeviceManager shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Live group for `group_id`, if any
    ///
    /// A group that has been told to stop no longer counts: anything forwarded
    /// to it would queue behind its `Shutdown` and be dropped.
    fn live_group(&self, group_id: &str) -> Option<&Addr<GroupCommand>> {
        self.groups
            .get(group_id)
            .filter(|group| !group.is_stopped() && !self.stopping.contains(&group.id()))
    }

    fn stop_group(&mut self, group_id: &str) {
        if let Some(group) = self.groups.get(group_id) {
            self.stopping.insert(group.id());
            let _ = group.tell(GroupCommand::Shutdown);
        }
    }

    fn on_track_device(&mut self, me: &Addr<ManagerCommand>, request: TrackDevice) {
        let group = match self.live_group(&request.group_id) {
            Some(group) => group.clone(),
            None => self.start_group(me, &request.group_id),
        };

        let group_id = request.group_id.clone();
        if group.tell(GroupCommand::TrackDevice(request)).is_err() {
            warn!(%group_id, "Group stopped before TrackDevice could be forwarded");
            return;
        }
        *self.tracks_forwarded.entry(group.id()).or_default() += 1;
    }

    /// Stop an idle group unless a `TrackDevice` is still on its way to it
    fn on_group_idle(&mut self, idle: GroupIdle) {
        let GroupIdle {
            group_id,
            actor_id,
            tracks_seen,
        } = idle;

        let is_current = self
            .live_group(&group_id)
            .is_some_and(|group| group.id() == actor_id);
        if !is_current {
            debug!(%group_id, "Ignoring idle notice from a stopping or replaced group");
            return;
        }

        let forwarded = self.tracks_forwarded.get(&actor_id).copied().unwrap_or(0);
        if forwarded != tracks_seen {
            debug!(%group_id, forwarded, tracks_seen, "Idle group has a TrackDevice in flight, keeping it");
            return;
        }

        info!(%group_id, "Device group idle, stopping");
        self.stop_group(&group_id);
    }

    fn start_group(&mut self, me: &Addr<ManagerCommand>, group_id: &str) -> Addr<GroupCommand> {
        info!(%group_id, "Creating device group actor");
        let (addr, inbox) = mailbox();
        addr.watch_with(
            me.recipient(),
            ManagerCommand::GroupTerminated {
                group_id: group_id.to_string(),
                actor_id: addr.id(),
            },
        );

        let group = Group::new(group_id, self.group_settings.clone(), self.events.clone())
            .with_supervisor(me.adapter(ManagerCommand::GroupIdle));
        self.children.spawn(group.run(addr.clone(), inbox));
        self.groups.insert(group_id.to_string(), addr.clone());

        self.events.emit(IotEvent::GroupStarted {
            group_id: group_id.to_string(),
        });
        addr
    }

    fn on_device_list(&self, request: ListDevices) {
        match self.live_group(&request.group_id) {
            Some(group) => {
                let _ = group.tell(GroupCommand::ListDevices(request));
            }
            None => {
                debug!(group_id = %request.group_id, "ListDevices for unknown group, replying empty");
                let _ = request.reply_to.tell(DeviceList {
                    request_id: request.request_id,
                    ids: BTreeSet::new(),
                });
            }
        }
    }

    fn on_query_all(&self, request: QueryAll) {
        match self.live_group(&request.group_id) {
            Some(group) => {
                let _ = group.tell(GroupCommand::QueryAll(request));
            }
            None => {
                debug!(group_id = %request.group_id, "QueryAll for unknown group, replying empty");
                let _ = request.reply_to.tell(QueryResult::empty(request.request_id));
            }
        }
    }

    fn on_group_terminated(&mut self, group_id: String, actor_id: ActorId) {
        self.stopping.remove(&actor_id);
        self.tracks_forwarded.remove(&actor_id);
        match self.groups.get(&group_id) {
            Some(group) if group.id() == actor_id => {
                info!(%group_id, "Device group actor has been terminated");
                self.groups.remove(&group_id);
            }
            // Registry already points at a replacement
            _ => debug!(%group_id, "Replaced device group actor has been terminated"),
        }
        self.events.emit(IotEvent::GroupStopped { group_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerHandle;
    use crate::query::ReadingStatus;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn spawn_manager(events: Arc<EventBus>) -> ManagerHandle {
        spawn_manager_with(GroupSettings::default(), events)
    }

    fn spawn_manager_with(settings: GroupSettings, events: Arc<EventBus>) -> ManagerHandle {
        let (addr, inbox) = mailbox();
        let query_timeout = settings.query_timeout;
        tokio::spawn(Manager::new(settings, events).run(addr.clone(), inbox));
        ManagerHandle::new(addr, WAIT, query_timeout)
    }

    fn group_events(rx: &mut tokio::sync::broadcast::Receiver<IotEvent>) -> Vec<&'static str> {
        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.event_type().starts_with("Group") {
                types.push(event.event_type());
            }
        }
        types
    }

    async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<IotEvent>, event_type: &str) -> IotEvent {
        loop {
            let event = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            if event.event_type() == event_type {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_list_unknown_group_is_empty() {
        let events = crate::events::create_event_bus();
        let mut rx = events.subscribe();
        let manager = spawn_manager(events);

        let list = manager.list_devices(3, "nowhere").await.unwrap();
        assert_eq!(list.request_id, 3);
        assert!(list.ids.is_empty());

        // No group is spawned for a pure read
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_query_unknown_group_is_empty() {
        let manager = spawn_manager(crate::events::create_event_bus());
        let result = manager.query_all(9, "nowhere", None).await.unwrap();
        assert_eq!(result.request_id, 9);
        assert!(result.statuses.is_empty());
    }

    #[tokio::test]
    async fn test_track_creates_groups_and_devices() {
        let manager = spawn_manager(crate::events::create_event_bus());

        let a = manager.track_device("group-a", "device1").await.unwrap();
        let b = manager.track_device("group-b", "device1").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.group_id(), "group-a");
        assert_eq!(b.group_id(), "group-b");

        let again = manager.track_device("group-a", "device1").await.unwrap();
        assert_eq!(a, again);

        let list = manager.list_devices(0, "group-a").await.unwrap();
        assert_eq!(list.ids.len(), 1);
    }

    #[tokio::test]
    async fn test_query_through_manager() {
        let manager = spawn_manager(crate::events::create_event_bus());

        let device = manager.track_device("group", "device1").await.unwrap();
        manager.track_device("group", "device2").await.unwrap();
        device.record(0, 3.5, WAIT).await.unwrap();

        let result = manager.query_all(1, "group", Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(result.statuses["device1"], ReadingStatus::Value(3.5));
        assert_eq!(result.statuses["device2"], ReadingStatus::Empty);
    }

    #[tokio::test]
    async fn test_stopped_group_is_reaped() {
        let events = crate::events::create_event_bus();
        let mut rx = events.subscribe();
        let manager = spawn_manager(events);

        let first = manager.track_device("group", "device").await.unwrap();
        manager.stop_group("group").unwrap();

        assert_eq!(
            next_event(&mut rx, "GroupStopped").await,
            IotEvent::GroupStopped {
                group_id: "group".to_string()
            }
        );
        assert!(manager.list_devices(0, "group").await.unwrap().ids.is_empty());

        // Tracking again creates a fresh group and device
        let second = manager.track_device("group", "device").await.unwrap();
        assert_ne!(first.id(), second.id());
        assert!(first.is_stopped());
    }

    #[tokio::test]
    async fn test_track_immediately_after_stop_group() {
        let events = crate::events::create_event_bus();
        let mut rx = events.subscribe();
        let manager = spawn_manager(events);

        let first = manager.track_device("group", "device").await.unwrap();
        manager.stop_group("group").unwrap();
        // No wait: the old group still has Shutdown queued
        let second = manager.track_device("group", "device").await.unwrap();

        assert_ne!(first.id(), second.id());
        assert!(!second.is_stopped());
        let list = manager.list_devices(0, "group").await.unwrap();
        assert_eq!(list.ids.into_iter().collect::<Vec<_>>(), vec!["device".to_string()]);

        next_event(&mut rx, "GroupStopped").await;
        let (watcher, mut notices) = mailbox::<()>();
        first.addr().watch_with(watcher.recipient(), ());
        tokio::time::timeout(WAIT, notices.recv()).await.unwrap();
        assert!(!second.is_stopped());
        assert_eq!(manager.list_devices(1, "group").await.unwrap().ids.len(), 1);
    }

    #[tokio::test]
    async fn test_replaced_group_still_reports_stop() {
        let events = crate::events::create_event_bus();
        let mut rx = events.subscribe();
        let manager = spawn_manager(events);

        manager.track_device("group", "device").await.unwrap();
        manager.stop_group("group").unwrap();
        manager.track_device("group", "device").await.unwrap();

        let mut types = group_events(&mut rx);
        for _ in 0..50 {
            if types.len() >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            types.extend(group_events(&mut rx));
        }
        assert_eq!(types, vec!["GroupStarted", "GroupStarted", "GroupStopped"]);
    }

    #[tokio::test]
    async fn test_idle_group_is_stopped_by_manager() {
        let events = crate::events::create_event_bus();
        let mut rx = events.subscribe();
        let settings = GroupSettings {
            idle_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let manager = spawn_manager_with(settings, events);

        let first = manager.track_device("group", "device").await.unwrap();
        first.passivate().unwrap();
        next_event(&mut rx, "GroupStopped").await;

        let second = manager.track_device("group", "device").await.unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(second.read(0, WAIT).await.unwrap().value, None);
    }

    #[tokio::test]
    async fn test_idle_notice_ignored_while_track_in_flight() {
        let (me, _inbox) = mailbox::<ManagerCommand>();
        let mut manager = Manager::new(GroupSettings::default(), crate::events::create_event_bus());
        let (replies, _registered) = mailbox();

        let _ = manager.handle(
            &me,
            ManagerCommand::TrackDevice(TrackDevice {
                group_id: "group".to_string(),
                device_id: "device".to_string(),
                reply_to: replies.recipient(),
            }),
        );
        let group_id = manager.groups["group"].id();

        // The group went idle before it saw the forwarded TrackDevice
        let _ = manager.handle(
            &me,
            ManagerCommand::GroupIdle(GroupIdle {
                group_id: "group".to_string(),
                actor_id: group_id,
                tracks_seen: 0,
            }),
        );
        assert!(manager.live_group("group").is_some());

        let _ = manager.handle(
            &me,
            ManagerCommand::GroupIdle(GroupIdle {
                group_id: "group".to_string(),
                actor_id: group_id,
                tracks_seen: 1,
            }),
        );
        assert!(manager.live_group("group").is_none());
        assert!(manager.stopping.contains(&group_id));
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let manager = spawn_manager(crate::events::create_event_bus());
        let device = manager.track_device("group", "device").await.unwrap();

        manager.shutdown().unwrap();

        let (watcher, mut notices) = mailbox::<()>();
        device.addr().watch_with(watcher.recipient(), ());
        tokio::time::timeout(WAIT, notices.recv()).await.unwrap();
        assert!(manager.is_stopped() || manager.list_devices(0, "group").await.is_err());
    }
}
