//! Query coordinator task - scatter-gather with deadline

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{QueryCommand, QueryResult, QuerySnapshot, ReadingStatus};
use super::state::QueryState;
use crate::actor::{Addr, Mailbox, Recipient, mailbox, resume_on_panic};
use crate::device::{DeviceCommand, RequestId};
use crate::events::{EventBus, IotEvent};

/// Ephemeral entity answering one aggregate read
///
/// On start it watches and queries every snapshot device, then collects
/// replies, termination notices and the deadline until no device is pending.
/// It replies exactly once and stops.
pub struct QueryCoordinator {
    group_id: String,
    state: QueryState,
    reply_to: Recipient<QueryResult>,
    timer: JoinHandle<()>,
    events: Arc<EventBus>,
}

impl QueryCoordinator {
    /// Start a coordinator for `snapshot` and run it on its own task
    pub fn spawn(
        group_id: impl Into<String>,
        snapshot: QuerySnapshot,
        request_id: RequestId,
        reply_to: Recipient<QueryResult>,
        timeout: Duration,
        events: Arc<EventBus>,
    ) -> JoinHandle<()> {
        let group_id = group_id.into();
        debug!(%group_id, request_id, devices = snapshot.len(), ?timeout, "QueryCoordinator::spawn: called");

        let (addr, inbox) = mailbox();
        scatter(&addr, &snapshot, request_id);

        let timer_addr = addr.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // No-op once the coordinator has finished
            let _ = timer_addr.tell(QueryCommand::CollectionTimeout);
        });
        drop(addr);

        let coordinator = Self {
            group_id,
            state: QueryState::new(request_id, snapshot.device_ids().cloned()),
            reply_to,
            timer,
            events,
        };
        tokio::spawn(coordinator.run(inbox))
    }

    async fn run(mut self, mut inbox: Mailbox<QueryCommand>) {
        while !self.state.is_done() {
            let Some(cmd) = inbox.recv().await else {
                // Every sender is gone, nothing else can arrive
                self.state.on_timeout();
                break;
            };
            resume_on_panic("query", || self.handle(cmd));
        }

        self.timer.abort();
        self.finish();
    }

    fn handle(&mut self, cmd: QueryCommand) {
        match cmd {
            QueryCommand::WrappedValueReply(reply) => {
                if !self.state.on_reply(&reply.device_id, reply.value) {
                    debug!(device_id = %reply.device_id, "Ignoring late or duplicate reply");
                }
            }

            QueryCommand::DeviceTerminated { device_id } => {
                if self.state.on_terminated(&device_id) {
                    debug!(%device_id, "Device stopped before answering");
                }
            }

            QueryCommand::CollectionTimeout => {
                let expired = self.state.on_timeout();
                if expired > 0 {
                    warn!(
                        group_id = %self.group_id,
                        request_id = self.state.request_id(),
                        expired,
                        "Query deadline passed with devices still pending"
                    );
                }
            }
        }
    }

    fn finish(self) {
        let result = self.state.into_result();
        let timed_out = result.count(&ReadingStatus::TimedOut);
        let unavailable = result.count(&ReadingStatus::Unavailable);
        info!(
            group_id = %self.group_id,
            request_id = result.request_id,
            devices = result.statuses.len(),
            timed_out,
            unavailable,
            "Query completed"
        );

        self.events.emit(IotEvent::QueryCompleted {
            group_id: self.group_id.clone(),
            request_id: result.request_id,
            devices: result.statuses.len(),
            timed_out,
            unavailable,
        });

        if self.reply_to.tell(result).is_err() {
            debug!(group_id = %self.group_id, "Requester gone, query result dropped");
        }
    }
}

/// Watch and query every snapshot device, routing replies into this coordinator
fn scatter(addr: &Addr<QueryCommand>, snapshot: &QuerySnapshot, request_id: RequestId) {
    for (device_id, device) in snapshot.iter() {
        device.addr().watch_with(
            addr.recipient(),
            QueryCommand::DeviceTerminated {
                device_id: device_id.clone(),
            },
        );

        let reply_to = addr.adapter(QueryCommand::WrappedValueReply);
        if device
            .addr()
            .tell(DeviceCommand::ReadValue { request_id, reply_to })
            .is_err()
        {
            // The termination notice resolves this device
            debug!(%device_id, "Device already stopped when queried");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceHandle, ValueReply};
    use crate::events::create_event_bus;

    fn fake_device(device_id: &str) -> (DeviceHandle, Mailbox<DeviceCommand>) {
        let (addr, inbox) = mailbox();
        (DeviceHandle::new("group", device_id, addr), inbox)
    }

    async fn expect_read(inbox: &mut Mailbox<DeviceCommand>) -> (RequestId, Recipient<ValueReply>) {
        match inbox.recv().await {
            Some(DeviceCommand::ReadValue { request_id, reply_to }) => (request_id, reply_to),
            other => panic!("Expected ReadValue, got {:?}", other),
        }
    }

    fn reply(device_id: &str, value: Option<f64>) -> ValueReply {
        ValueReply {
            request_id: 0,
            device_id: device_id.to_string(),
            value,
        }
    }

    fn start(devices: &[&DeviceHandle], timeout: Duration) -> (Mailbox<QueryResult>, JoinHandle<()>) {
        let (requester, results) = mailbox();
        let snapshot: QuerySnapshot = devices.iter().map(|d| (*d).clone()).collect();
        let task = QueryCoordinator::spawn(
            "group",
            snapshot,
            1,
            requester.recipient(),
            timeout,
            create_event_bus(),
        );
        (results, task)
    }

    #[tokio::test]
    async fn test_return_values_for_working_devices() {
        let (d1, mut d1_box) = fake_device("device1");
        let (d2, mut d2_box) = fake_device("device2");
        let (mut results, _task) = start(&[&d1, &d2], Duration::from_secs(3));

        let (request_id, d1_reply) = expect_read(&mut d1_box).await;
        assert_eq!(request_id, 1);
        let (_, d2_reply) = expect_read(&mut d2_box).await;
        d1_reply.tell(reply("device1", Some(1.0))).unwrap();
        d2_reply.tell(reply("device2", Some(2.0))).unwrap();

        let result = results.recv().await.unwrap();
        assert_eq!(result.request_id, 1);
        assert_eq!(result.statuses["device1"], ReadingStatus::Value(1.0));
        assert_eq!(result.statuses["device2"], ReadingStatus::Value(2.0));
    }

    #[tokio::test]
    async fn test_return_empty_for_devices_without_readings() {
        let (d1, mut d1_box) = fake_device("device1");
        let (d2, mut d2_box) = fake_device("device2");
        let (mut results, _task) = start(&[&d1, &d2], Duration::from_secs(3));

        let (_, d1_reply) = expect_read(&mut d1_box).await;
        let (_, d2_reply) = expect_read(&mut d2_box).await;
        d1_reply.tell(reply("device1", None)).unwrap();
        d2_reply.tell(reply("device2", Some(2.0))).unwrap();

        let result = results.recv().await.unwrap();
        assert_eq!(result.statuses["device1"], ReadingStatus::Empty);
        assert_eq!(result.statuses["device2"], ReadingStatus::Value(2.0));
    }

    #[tokio::test]
    async fn test_return_unavailable_if_device_stops_before_answering() {
        let (d1, d1_box) = fake_device("device1");
        let (d2, mut d2_box) = fake_device("device2");
        let (mut results, _task) = start(&[&d1, &d2], Duration::from_secs(3));

        let (_, d2_reply) = expect_read(&mut d2_box).await;
        d2_reply.tell(reply("device2", Some(2.0))).unwrap();
        drop(d1_box);

        let result = results.recv().await.unwrap();
        assert_eq!(result.statuses["device1"], ReadingStatus::Unavailable);
        assert_eq!(result.statuses["device2"], ReadingStatus::Value(2.0));
    }

    #[tokio::test]
    async fn test_return_timed_out_if_device_does_not_answer_in_time() {
        let (d1, mut d1_box) = fake_device("device1");
        let (d2, mut d2_box) = fake_device("device2");
        let (mut results, _task) = start(&[&d1, &d2], Duration::from_millis(300));

        let _ = expect_read(&mut d1_box).await;
        let (_, d2_reply) = expect_read(&mut d2_box).await;
        d2_reply.tell(reply("device2", Some(2.0))).unwrap();

        let result = results.recv().await.unwrap();
        assert_eq!(result.statuses["device1"], ReadingStatus::TimedOut);
        assert_eq!(result.statuses["device2"], ReadingStatus::Value(2.0));
    }

    #[tokio::test]
    async fn test_device_dead_before_query_is_unavailable() {
        let (d1, d1_box) = fake_device("device1");
        drop(d1_box);
        let (mut results, _task) = start(&[&d1], Duration::from_secs(3));

        let result = results.recv().await.unwrap();
        assert_eq!(result.statuses["device1"], ReadingStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_replies_exactly_once_and_ignores_late_replies() {
        let (d1, mut d1_box) = fake_device("device1");
        let (mut results, task) = start(&[&d1], Duration::from_secs(3));

        let (_, d1_reply) = expect_read(&mut d1_box).await;
        d1_reply.tell(reply("device1", Some(1.0))).unwrap();
        let result = results.recv().await.unwrap();
        assert_eq!(result.statuses.len(), 1);

        task.await.unwrap();
        // Coordinator is gone: late replies and termination notices are no-ops
        assert!(d1_reply.tell(reply("device1", Some(5.0))).is_err());
        drop(d1_box);
        assert!(results.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_snapshot_replies_immediately() {
        let (mut results, _task) = start(&[], Duration::from_secs(30));
        let result = tokio::time::timeout(Duration::from_secs(1), results.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(result.statuses.is_empty());
    }

    #[tokio::test]
    async fn test_query_real_devices() {
        let events = create_event_bus();
        let d1 = Device::spawn("group", "device1", events.clone());
        let d2 = Device::spawn("group", "device2", events.clone());
        d1.record(1, 21.0, Duration::from_secs(1)).await.unwrap();

        let (mut results, _task) = start(&[&d1, &d2], Duration::from_secs(3));
        let result = results.recv().await.unwrap();
        assert_eq!(result.statuses["device1"], ReadingStatus::Value(21.0));
        assert_eq!(result.statuses["device2"], ReadingStatus::Empty);
    }
}
