//! Property tests for query collection state
//!
//! Whatever order replies, termination notices and the deadline arrive in,
//! every snapshot device ends with exactly one status.

use std::collections::BTreeSet;

use iotd::query::{QueryState, ReadingStatus};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Reply(usize, Option<f64>),
    Terminated(usize),
}

fn step(devices: usize) -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..devices, proptest::option::of(-50.0f64..150.0)).prop_map(|(i, v)| Step::Reply(i, v)),
        (0..devices).prop_map(Step::Terminated),
    ]
}

fn scenario() -> impl Strategy<Value = (usize, Vec<Step>, bool)> {
    (1usize..12).prop_flat_map(|n| (Just(n), proptest::collection::vec(step(n), 0..40), any::<bool>()))
}

fn device_id(i: usize) -> String {
    format!("device{}", i)
}

proptest! {
    #[test]
    fn every_device_resolves_exactly_once((n, steps, deadline) in scenario()) {
        let ids: BTreeSet<String> = (0..n).map(device_id).collect();
        let mut state = QueryState::new(1, ids.iter().cloned());
        let mut first_event = std::collections::BTreeMap::new();

        for step in &steps {
            let (i, expected, accepted) = match *step {
                Step::Reply(i, value) => {
                    let status = value.map_or(ReadingStatus::Empty, ReadingStatus::Value);
                    (i, status, state.on_reply(&device_id(i), value))
                }
                Step::Terminated(i) => (i, ReadingStatus::Unavailable, state.on_terminated(&device_id(i))),
            };
            // Only the first event for a device is accepted
            prop_assert_eq!(accepted, !first_event.contains_key(&i));
            first_event.entry(i).or_insert(expected);

            let pending: BTreeSet<_> = state.pending().iter().cloned().collect();
            let finalized: BTreeSet<_> = state.finalized().keys().cloned().collect();
            prop_assert!(pending.is_disjoint(&finalized));
            prop_assert_eq!(pending.union(&finalized).cloned().collect::<BTreeSet<_>>(), ids.clone());
        }

        if deadline {
            let expired = state.on_timeout();
            prop_assert_eq!(expired, n - first_event.len());
            // A second deadline changes nothing
            prop_assert_eq!(state.on_timeout(), 0);
        }

        let done = state.is_done();
        let result = state.into_result();
        if deadline || first_event.len() == n {
            prop_assert!(done);
            prop_assert_eq!(result.statuses.keys().cloned().collect::<BTreeSet<_>>(), ids);
        }

        for (i, status) in &first_event {
            prop_assert_eq!(result.statuses.get(&device_id(*i)), Some(status));
        }
        if deadline {
            prop_assert_eq!(result.count(&ReadingStatus::TimedOut), n - first_event.len());
        }
    }
}
