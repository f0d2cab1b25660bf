//! Redelivery filter for bus messages

use std::collections::{HashSet, VecDeque};

/// Requests remembered by default
pub const DEFAULT_DEDUP_CAPACITY: usize = 1024;

type RequestKey = (String, String);

/// Bounded set of `(job id, message id)` pairs already accepted
///
/// When full, the oldest pair is forgotten first.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    order: VecDeque<RequestKey>,
    seen: HashSet<RequestKey>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record a request; returns `false` if it was already recorded
    pub fn insert(&mut self, job_id: &str, message_id: &str) -> bool {
        let key = (job_id.to_string(), message_id.to_string());
        if self.seen.contains(&key) {
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.order.push_back(key.clone());
        self.seen.insert(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
