//! Collection state of one aggregate query
//!
//! `pending` and `finalized` are disjoint and together always cover the
//! snapshot's device ids. Every transition only moves ids out of `pending`,
//! so late or duplicate events for a finalized id change nothing.

use std::collections::{BTreeMap, BTreeSet};

use super::messages::{QueryResult, ReadingStatus};
use crate::device::RequestId;

#[derive(Debug, Clone)]
pub struct QueryState {
    request_id: RequestId,
    pending: BTreeSet<String>,
    finalized: BTreeMap<String, ReadingStatus>,
}

impl QueryState {
    pub fn new<I, S>(request_id: RequestId, device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            request_id,
            pending: device_ids.into_iter().map(Into::into).collect(),
            finalized: BTreeMap::new(),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    pub fn finalized(&self) -> &BTreeMap<String, ReadingStatus> {
        &self.finalized
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record a device's answer; false if the id was not pending
    pub fn on_reply(&mut self, device_id: &str, value: Option<f64>) -> bool {
        let status = match value {
            Some(value) => ReadingStatus::Value(value),
            None => ReadingStatus::Empty,
        };
        self.finalize(device_id, status)
    }

    /// Record that a device stopped; false if the id was not pending
    pub fn on_terminated(&mut self, device_id: &str) -> bool {
        self.finalize(device_id, ReadingStatus::Unavailable)
    }

    /// Mark every pending id as timed out; returns how many were
    pub fn on_timeout(&mut self) -> usize {
        let expired = std::mem::take(&mut self.pending);
        let count = expired.len();
        self.finalized
            .extend(expired.into_iter().map(|id| (id, ReadingStatus::TimedOut)));
        count
    }

    fn finalize(&mut self, device_id: &str, status: ReadingStatus) -> bool {
        if !self.pending.remove(device_id) {
            return false;
        }
        self.finalized.insert(device_id.to_string(), status);
        true
    }

    pub fn into_result(self) -> QueryResult {
        QueryResult {
            request_id: self.request_id,
            statuses: self.finalized,
        }
    }
}
