//! Recency Tracker Module
//!
//! Side table of "last touched" stamps used for approximate LRU eviction.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::cache::expirable::current_timestamp_ms;

// == Touch ==
/// When a key was last written or read.
///
/// Orders by the tracker's touch counter, so a wall clock stepping backwards
/// cannot make a fresh touch look old. `at_millis` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Touch {
    /// Unix milliseconds of the touch
    pub at_millis: i64,
    /// Touch counter value
    pub seq: u64,
}

impl Ord for Touch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seq
            .cmp(&other.seq)
            .then(self.at_millis.cmp(&other.at_millis))
    }
}

impl PartialOrd for Touch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Touch {
    /// A stamp that compares after every touch recorded so far.
    pub fn now_upper_bound() -> Self {
        Self {
            at_millis: current_timestamp_ms(),
            seq: u64::MAX,
        }
    }
}

// == Recency Tracker ==
/// Concurrent key -> [`Touch`] map kept next to the entry store.
///
/// Concurrent touches may interleave so the recorded order only approximates
/// real access order.
#[derive(Debug)]
pub struct RecencyTracker<K>
where
    K: Eq + Hash,
{
    stamps: DashMap<K, Touch>,
    seq: AtomicU64,
}

impl<K> RecencyTracker<K>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a tracker sized for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stamps: DashMap::with_capacity(capacity),
            seq: AtomicU64::new(0),
        }
    }

    // == Touch ==
    /// Records "now" for `key`, creating the record if absent.
    pub fn touch(&self, key: &K) -> Touch {
        let touch = Touch {
            at_millis: current_timestamp_ms(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        self.stamps.insert(key.clone(), touch);
        touch
    }

    // == Remove ==
    /// Drops the record for `key`.
    pub fn remove(&self, key: &K) -> Option<Touch> {
        self.stamps.remove(key).map(|(_, touch)| touch)
    }

    /// Returns the last touch of `key`, if tracked.
    pub fn get(&self, key: &K) -> Option<Touch> {
        self.stamps.get(key).map(|r| *r.value())
    }

    // == Snapshot ==
    /// Copies out every current stamp.
    pub fn snapshot_timestamps(&self) -> Vec<Touch> {
        self.stamps.iter().map(|r| *r.value()).collect()
    }

    /// Keeps only the records for which `keep` returns true.
    ///
    /// Returns the number of records dropped.
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) -> usize {
        let before = self.stamps.len();
        self.stamps.retain(|key, _| keep(key));
        before.saturating_sub(self.stamps.len())
    }

    /// Drops every record.
    pub fn clear(&self) {
        self.stamps.clear();
    }

    // == Length ==
    /// Snapshot of the tracked keys.
    pub fn keys(&self) -> Vec<K> {
        self.stamps.iter().map(|r| r.key().clone()).collect()
    }

    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.stamps.contains_key(key)
    }
}

impl<K> Default for RecencyTracker<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
