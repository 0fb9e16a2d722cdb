//! Bounded Cache Module
//!
//! The public cache type: entry store, optional recency tracker, the two
//! eviction policies and the cleanup scheduler composed behind one handle.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::cache::expirable::Expirable;
use crate::cache::policy::{
    ArbitraryOrder, EvictExpired, LeastRecentlyTouched, NeverEvict, NormalEviction, VictimSelector,
};
use crate::cache::recency::RecencyTracker;
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::store::EntryStore;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::{CleanupOutcome, CleanupReport, CleanupScheduler, CleanupTarget};

// == Core ==
/// Shared state behind every [`BoundedCache`] handle.
///
/// Background tasks only keep a weak reference to it.
struct CacheCore<K, V>
where
    K: Eq + Hash,
{
    store: EntryStore<K, V>,
    recency: Option<Arc<RecencyTracker<K>>>,
    normal: Box<dyn NormalEviction<K, V>>,
    selector: Box<dyn VictimSelector<K, V>>,
    config: CacheConfig,
    scheduler: CleanupScheduler,
    stats: StatsRecorder,
}

impl<K, V> CacheCore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn touch(&self, key: &K) {
        if let Some(recency) = &self.recency {
            recency.touch(key);
        }
    }

    fn forget(&self, key: &K) {
        if let Some(recency) = &self.recency {
            recency.remove(key);
        }
    }

    /// Brings the tracker back in line with the store after racing writers:
    /// records of absent keys are dropped, untracked keys are touched now.
    fn reconcile_recency(&self, recency: &RecencyTracker<K>) {
        let pruned = recency.retain(|key| self.store.contains_key(key));
        let mut adopted = 0usize;
        for key in self.store.keys() {
            if !recency.contains(&key) {
                recency.touch(&key);
                adopted += 1;
            }
        }
        if pruned + adopted > 0 {
            debug!(pruned, adopted, "reconciled recency records with the store");
        }
    }

    /// Body of a cleanup pass; the caller holds the run slot.
    fn run_pass(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for key in self.store.keys() {
            let removed = self
                .store
                .remove_if(&key, |k, v| self.normal.is_normally_evictable(k, v));
            if removed.is_some() {
                self.forget(&key);
                report.expired += 1;
            }
        }

        if let Some(recency) = &self.recency {
            self.reconcile_recency(recency);
        }

        let current = self.store.len();
        if current > self.config.max_capacity {
            let target = self.config.evict_to_capacity;
            let victims = self.selector.select_victims(current, target, &self.store);
            for key in victims {
                if self.store.len() <= target {
                    break;
                }
                if self.store.remove(&key).is_some() {
                    self.forget(&key);
                    report.evicted += 1;
                }
            }
        }

        report.remaining = self.store.len();
        if report.remaining > self.config.max_capacity {
            warn!(
                remaining = report.remaining,
                max_capacity = self.config.max_capacity,
                "cleanup pass left the cache above max_capacity"
            );
        }
        self.stats.record_pass(report.expired, report.evicted);
        report
    }
}

impl<K, V> CleanupTarget for CacheCore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn attempt_cleanup(&self) -> CleanupOutcome {
        let Some(_guard) = self.scheduler.slot().try_claim() else {
            self.stats.record_skipped();
            return CleanupOutcome::Skipped;
        };
        CleanupOutcome::Completed(self.run_pass())
    }
}

// == Bounded Cache ==
/// Concurrent key-value cache that keeps itself near a configured size.
///
/// Every write is applied first and the size checked afterwards; crossing
/// `evict_to_capacity` schedules a short-delay cleanup attempt on the tokio
/// runtime the cache was built in. Between a burst of writes and the next
/// pass `len()` may exceed `max_capacity`.
///
/// Handles are cheap to clone and share the same cache.
pub struct BoundedCache<K, V>
where
    K: Eq + Hash,
{
    core: Arc<CacheCore<K, V>>,
}

impl<K, V> Clone for BoundedCache<K, V>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("config", &self.core.config)
            .field("tracks_recency", &self.core.recency.is_some())
            .finish_non_exhaustive()
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Starts a builder with no normal eviction and arbitrary victim order.
    pub fn builder(config: CacheConfig) -> CacheBuilder<K, V> {
        CacheBuilder::new(config)
    }

    /// Size-bounded cache without TTL sweeps; victims in arbitrary order.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Size-bounded cache evicting the least recently touched keys first.
    pub fn lru(config: CacheConfig) -> Result<Self> {
        Self::builder(config).least_recently_touched().build()
    }

    // == Writes ==
    /// Stores `value`, returning the previous value.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let previous = self.core.store.insert(key.clone(), value);
        self.core.touch(&key);
        self.check_capacity();
        previous
    }

    /// Stores every pair, checking capacity once at the end.
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) {
        for (key, value) in entries {
            self.core.store.insert(key.clone(), value);
            self.core.touch(&key);
        }
        self.check_capacity();
    }

    /// Stores `value` only if `key` is vacant; returns the existing value otherwise.
    pub fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        let existing = self.core.store.insert_if_absent(key.clone(), value);
        self.core.touch(&key);
        self.check_capacity();
        existing
    }

    /// Removes `key`; a missing key is a no-op returning `None`.
    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self.core.store.remove(key);
        if removed.is_some() {
            self.core.forget(key);
        }
        self.check_capacity();
        removed
    }

    /// Overwrites the value of a present key.
    pub fn replace(&self, key: &K, value: V) -> Option<V> {
        let previous = self.core.store.replace(key, value);
        if previous.is_some() {
            self.core.touch(key);
        }
        self.check_capacity();
        previous
    }

    // == Reads ==
    /// Returns the value under `key` and records a hit or miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.core.store.get(key);
        match value {
            Some(_) => {
                self.core.stats.record_hit();
                self.core.touch(key);
            }
            None => self.core.stats.record_miss(),
        }
        value
    }

    /// Returns the value under `key`, or `default` when absent. Counts as a
    /// hit or miss like [`get`](Self::get).
    pub fn get_or_default(&self, key: &K, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.core.store.contains_key(key)
    }

    // == Compute Family ==
    /// Maps `key` to `f(key)` if vacant; returns the current value.
    pub fn compute_if_absent(&self, key: K, f: impl FnOnce(&K) -> Option<V>) -> Option<V> {
        let value = self.core.store.compute_if_absent(key.clone(), f);
        if value.is_some() {
            self.core.touch(&key);
        }
        self.check_capacity();
        value
    }

    /// Recomputes a present key; `None` removes it.
    pub fn compute_if_present(&self, key: &K, f: impl FnOnce(&K, &V) -> Option<V>) -> Option<V> {
        let value = self.core.store.compute_if_present(key, f);
        self.sync_recency(key, value.is_some());
        self.check_capacity();
        value
    }

    /// Recomputes the mapping of `key`; `None` removes it.
    pub fn compute(&self, key: K, f: impl FnOnce(&K, Option<&V>) -> Option<V>) -> Option<V> {
        let value = self.core.store.compute(key.clone(), f);
        self.sync_recency(&key, value.is_some());
        self.check_capacity();
        value
    }

    /// Inserts `value` or combines it with the present one; `None` removes.
    pub fn merge(&self, key: K, value: V, f: impl FnOnce(&V, V) -> Option<V>) -> Option<V> {
        let merged = self.core.store.merge(key.clone(), value, f);
        self.sync_recency(&key, merged.is_some());
        self.check_capacity();
        merged
    }

    // == Whole-Cache ==
    pub fn clear(&self) {
        self.core.store.clear();
        if let Some(recency) = &self.core.recency {
            recency.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.core.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.store.is_empty()
    }

    /// Snapshot of the current keys.
    pub fn keys(&self) -> Vec<K> {
        self.core.store.keys()
    }

    /// Snapshot of the current values.
    pub fn values(&self) -> Vec<V> {
        self.core.store.values()
    }

    /// Snapshot of the current entries.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.core.store.entries()
    }

    /// Visits every entry; `f` must not write to this cache.
    pub fn for_each(&self, f: impl FnMut(&K, &V)) {
        self.core.store.for_each(f);
    }

    /// Visits every entry, in parallel once `len() >= threshold`.
    pub fn for_each_parallel<F>(&self, threshold: usize, f: F)
    where
        F: Fn(&K, &V) + Send + Sync,
    {
        self.core.store.for_each_parallel(threshold, f);
    }

    /// Reduces transformed entries, in parallel once `len() >= threshold`.
    pub fn reduce_parallel<U, T, R>(&self, threshold: usize, transform: T, reduce: R) -> Option<U>
    where
        U: Send,
        T: Fn(&K, &V) -> Option<U> + Send + Sync,
        R: Fn(U, U) -> U + Send + Sync,
    {
        self.core.store.reduce_parallel(threshold, transform, reduce)
    }

    /// Finds any entry for which `f` yields a result, in parallel once
    /// `len() >= threshold`.
    pub fn search_parallel<U, F>(&self, threshold: usize, f: F) -> Option<U>
    where
        U: Send,
        F: Fn(&K, &V) -> Option<U> + Send + Sync,
    {
        self.core.store.search_parallel(threshold, f)
    }

    // == Cleanup ==
    /// Attempts a cleanup pass on the calling thread.
    ///
    /// Returns [`CleanupOutcome::Skipped`] without waiting when another pass
    /// is running, so eviction is not guaranteed to have happened on return.
    /// A panicking eviction policy unwinds out of this call; the run slot is
    /// still released.
    pub fn force_cleanup(&self) -> CleanupOutcome {
        self.core.attempt_cleanup()
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.core.scheduler.slot().is_running()
    }

    pub fn stats(&self) -> CacheStats {
        self.core.stats.snapshot(self.core.store.len())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.core.config
    }

    /// Returns true if keys are tracked for least-recently-touched eviction.
    pub fn tracks_recency(&self) -> bool {
        self.core.recency.is_some()
    }

    /// Keys the recency tracker currently holds, `None` without a tracker.
    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> Option<Vec<K>> {
        self.core.recency.as_ref().map(|recency| recency.keys())
    }

    fn sync_recency(&self, key: &K, present: bool) {
        if present {
            self.core.touch(key);
        } else {
            self.core.forget(key);
        }
    }

    fn check_capacity(&self) {
        if self.core.store.len() > self.core.config.evict_to_capacity {
            self.core
                .scheduler
                .request_one_shot(Arc::downgrade(&self.core));
        }
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Removes `key` only if it currently maps to `expected`.
    pub fn remove_if_eq(&self, key: &K, expected: &V) -> bool {
        let removed = self
            .core
            .store
            .remove_if(key, |_, current| current == expected)
            .is_some();
        if removed {
            self.core.forget(key);
        }
        removed
    }

    /// Stores `new` only if `key` currently maps to `expected`.
    pub fn replace_if_eq(&self, key: &K, expected: &V, new: V) -> bool {
        let replaced = self.core.store.replace_if_eq(key, expected, new);
        if replaced {
            self.core.touch(key);
        }
        self.check_capacity();
        replaced
    }
}

/// Result of a TTL-aware lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// The key maps to a value that has not expired
    Live(V),
    /// The key mapped to an expired value, which has been removed
    Expired,
    /// The key is not present
    Absent,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Expirable + Clone + Send + Sync + 'static,
{
    /// Looks up `key`, treating an expired value as gone.
    ///
    /// An expired value is removed right away instead of waiting for the next
    /// sweep. Only a live value counts as a hit.
    pub fn get_live(&self, key: &K) -> Lookup<V> {
        let Some(value) = self.core.store.get(key) else {
            self.core.stats.record_miss();
            return Lookup::Absent;
        };

        if value.is_expired() {
            if self.core.store.remove_if(key, |_, v| v.is_expired()).is_some() {
                self.core.forget(key);
            }
            self.core.stats.record_miss();
            return Lookup::Expired;
        }

        self.core.stats.record_hit();
        self.core.touch(key);
        Lookup::Live(value)
    }

    /// Size-bounded cache that also sweeps expired values; arbitrary victims.
    pub fn expiring(config: CacheConfig) -> Result<Self> {
        Self::builder(config).expire_entries().build()
    }

    /// Size-bounded cache that sweeps expired values and evicts the least
    /// recently touched keys first.
    pub fn expiring_lru(config: CacheConfig) -> Result<Self> {
        Self::builder(config)
            .expire_entries()
            .least_recently_touched()
            .build()
    }
}

// == Builder ==
/// Assembles a [`BoundedCache`] from a configuration and two policies.
pub struct CacheBuilder<K, V>
where
    K: Eq + Hash,
{
    config: CacheConfig,
    normal: Box<dyn NormalEviction<K, V>>,
    selector: Box<dyn VictimSelector<K, V>>,
    recency: Option<Arc<RecencyTracker<K>>>,
    runtime: Option<Handle>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn new(config: CacheConfig) -> Self {
        Self {
            config,
            normal: Box::new(NeverEvict),
            selector: Box::new(ArbitraryOrder),
            recency: None,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Sets the per-entry test applied on every pass.
    pub fn normal_eviction(mut self, policy: impl NormalEviction<K, V> + 'static) -> Self {
        self.normal = Box::new(policy);
        self
    }

    /// Sets the over-capacity victim selector.
    ///
    /// A selector reading a recency tracker has that tracker kept up to date
    /// by the cache.
    pub fn victim_selector(mut self, selector: impl VictimSelector<K, V> + 'static) -> Self {
        self.recency = selector.recency();
        self.selector = Box::new(selector);
        self
    }

    /// Tracks key recency and evicts the least recently touched keys first.
    pub fn least_recently_touched(self) -> Self {
        let tracker = Arc::new(RecencyTracker::with_capacity(self.config.initial_capacity));
        self.victim_selector(LeastRecentlyTouched::new(tracker))
    }

    /// Spawns background cleanup on `runtime` instead of the ambient one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validates the configuration and starts the periodic sweep if one is
    /// configured.
    pub fn build(self) -> Result<BoundedCache<K, V>> {
        self.config.validate()?;

        let core = Arc::new(CacheCore {
            store: EntryStore::with_capacity(self.config.initial_capacity),
            recency: self.recency,
            normal: self.normal,
            selector: self.selector,
            config: self.config,
            scheduler: CleanupScheduler::new(self.runtime),
            stats: StatsRecorder::new(),
        });
        core.scheduler
            .start_periodic(Arc::downgrade(&core), core.config.cleanup_interval_secs)?;

        debug!(config = ?core.config, "bounded cache created");
        Ok(BoundedCache { core })
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Expirable + Clone + Send + Sync + 'static,
{
    /// Sweeps values reporting themselves expired on every pass.
    pub fn expire_entries(self) -> Self {
        self.normal_eviction(EvictExpired)
    }
}
