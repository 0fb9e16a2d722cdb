//! Eviction Policy Module
//!
//! The two swappable decisions a cleanup pass delegates: which entries are
//! evictable on their own (TTL style) and which entries to drop when the
//! store is over capacity.

use std::hash::Hash;
use std::sync::Arc;

use crate::cache::expirable::Expirable;
use crate::cache::recency::{RecencyTracker, Touch};
use crate::cache::store::EntryStore;

// == Normal Eviction ==
/// Per-entry test applied to every entry during a cleanup pass.
///
/// Runs on whichever thread performs the pass and must depend only on the
/// entry it is given.
pub trait NormalEviction<K, V>: Send + Sync {
    fn is_normally_evictable(&self, key: &K, value: &V) -> bool;
}

/// Never evicts anything on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverEvict;

impl<K, V> NormalEviction<K, V> for NeverEvict {
    fn is_normally_evictable(&self, _key: &K, _value: &V) -> bool {
        false
    }
}

/// Evicts values that report themselves expired.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictExpired;

impl<K, V: Expirable> NormalEviction<K, V> for EvictExpired {
    fn is_normally_evictable(&self, _key: &K, value: &V) -> bool {
        value.is_expired()
    }
}

impl<K, V, F> NormalEviction<K, V> for F
where
    F: Fn(&K, &V) -> bool + Send + Sync,
{
    fn is_normally_evictable(&self, key: &K, value: &V) -> bool {
        self(key, value)
    }
}

// == Victim Selection ==
/// Chooses candidate keys when a pass finds the store above `max_capacity`.
///
/// The caller removes candidates in the returned order and stops as soon as
/// the store is back at `target`, so selectors may over-select.
pub trait VictimSelector<K, V>: Send + Sync
where
    K: Eq + Hash,
{
    fn select_victims(&self, current: usize, target: usize, store: &EntryStore<K, V>) -> Vec<K>;

    /// The recency tracker this selector reads, if any.
    ///
    /// A cache built with this selector keeps the returned tracker updated
    /// on every read and write.
    fn recency(&self) -> Option<Arc<RecencyTracker<K>>> {
        None
    }
}

/// Hands back every key in store iteration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitraryOrder;

impl<K, V> VictimSelector<K, V> for ArbitraryOrder
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn select_victims(&self, _current: usize, _target: usize, store: &EntryStore<K, V>) -> Vec<K> {
        store.keys()
    }
}

/// Approximate LRU selection over a [`RecencyTracker`].
///
/// The cutoff is the `(current - target)`-th oldest recorded touch (or "now"
/// when nothing is tracked); every stored key touched at or before the cutoff
/// is selected, oldest first. Keys without a record are skipped.
#[derive(Debug)]
pub struct LeastRecentlyTouched<K>
where
    K: Eq + Hash,
{
    tracker: Arc<RecencyTracker<K>>,
}

impl<K> LeastRecentlyTouched<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(tracker: Arc<RecencyTracker<K>>) -> Self {
        Self { tracker }
    }

    /// Returns the touch at or before which keys become victims, or `None`
    /// when nothing needs to go.
    pub fn cutoff(&self, current: usize, target: usize) -> Option<Touch> {
        let excess = current.saturating_sub(target);
        if excess == 0 {
            return None;
        }

        let mut stamps = self.tracker.snapshot_timestamps();
        if stamps.is_empty() {
            return Some(Touch::now_upper_bound());
        }

        let nth = excess.min(stamps.len()) - 1;
        let (_, cutoff, _) = stamps.select_nth_unstable(nth);
        Some(*cutoff)
    }
}

impl<K, V> VictimSelector<K, V> for LeastRecentlyTouched<K>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone,
{
    fn select_victims(&self, current: usize, target: usize, store: &EntryStore<K, V>) -> Vec<K> {
        let Some(cutoff) = self.cutoff(current, target) else {
            return Vec::new();
        };

        let mut victims: Vec<(Touch, K)> = store
            .keys()
            .into_iter()
            .filter_map(|key| {
                let touch = self.tracker.get(&key)?;
                (touch <= cutoff).then_some((touch, key))
            })
            .collect();
        victims.sort_unstable_by_key(|(touch, _)| *touch);

        victims.into_iter().map(|(_, key)| key).collect()
    }

    fn recency(&self) -> Option<Arc<RecencyTracker<K>>> {
        Some(Arc::clone(&self.tracker))
    }
}
