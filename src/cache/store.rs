//! Entry Store Module
//!
//! Sharded concurrent map holding the cache entries.

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rayon::prelude::*;

// == Entry Store ==
/// Thread-safe key -> value storage.
///
/// Every single-key operation is atomic with respect to the others on the
/// same key. Nothing is ordered across keys. Closures passed to the compute
/// family run while the key's shard is write-locked and must not call back
/// into the same store.
#[derive(Debug)]
pub struct EntryStore<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty store sized for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
        }
    }

    // == Insert ==
    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Stores `value` only if `key` is vacant.
    ///
    /// Returns the existing value when the key was already present.
    pub fn insert_if_absent(&self, key: K, value: V) -> Option<V> {
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                None
            }
        }
    }

    // == Remove ==
    /// Removes `key`, returning its value if it was present.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// Removes `key` only if `predicate` holds for its current entry.
    pub fn remove_if(&self, key: &K, predicate: impl FnOnce(&K, &V) -> bool) -> Option<V> {
        self.entries.remove_if(key, predicate).map(|(_, v)| v)
    }

    // == Replace ==
    /// Overwrites the value of an existing key; does nothing for a vacant key.
    pub fn replace(&self, key: &K, value: V) -> Option<V> {
        self.entries
            .get_mut(key)
            .map(|mut current| std::mem::replace(current.value_mut(), value))
    }

    // == Read ==
    /// Returns a clone of the value under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    /// Returns the value under `key`, or `default` when vacant.
    pub fn get_or_default(&self, key: &K, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    // == Compute Family ==
    /// Inserts `f(key)` if vacant; returns the value now mapped.
    ///
    /// `f` returning `None` leaves the key vacant.
    pub fn compute_if_absent(&self, key: K, f: impl FnOnce(&K) -> Option<V>) -> Option<V> {
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let value = f(vacant.key())?;
                vacant.insert(value.clone());
                Some(value)
            }
        }
    }

    /// Recomputes the value of a present key; `None` removes it.
    pub fn compute_if_present(&self, key: &K, f: impl FnOnce(&K, &V) -> Option<V>) -> Option<V> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => match f(occupied.key(), occupied.get()) {
                Some(value) => {
                    occupied.insert(value.clone());
                    Some(value)
                }
                None => {
                    occupied.remove();
                    None
                }
            },
            Entry::Vacant(_) => None,
        }
    }

    /// Recomputes the mapping of `key` from its current value (if any).
    ///
    /// `None` removes the mapping or leaves the key vacant.
    pub fn compute(&self, key: K, f: impl FnOnce(&K, Option<&V>) -> Option<V>) -> Option<V> {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => match f(occupied.key(), Some(occupied.get())) {
                Some(value) => {
                    occupied.insert(value.clone());
                    Some(value)
                }
                None => {
                    occupied.remove();
                    None
                }
            },
            Entry::Vacant(vacant) => {
                let value = f(vacant.key(), None)?;
                vacant.insert(value.clone());
                Some(value)
            }
        }
    }

    /// Inserts `value` if vacant, otherwise stores `f(current, value)`.
    ///
    /// `f` returning `None` removes the mapping.
    pub fn merge(&self, key: K, value: V, f: impl FnOnce(&V, V) -> Option<V>) -> Option<V> {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => match f(occupied.get(), value) {
                Some(merged) => {
                    occupied.insert(merged.clone());
                    Some(merged)
                }
                None => {
                    occupied.remove();
                    None
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(value.clone());
                Some(value)
            }
        }
    }

    // == Bulk ==
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the current keys.
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Snapshot of the current values.
    pub fn values(&self) -> Vec<V> {
        self.entries.iter().map(|r| r.value().clone()).collect()
    }

    /// Snapshot of the current entries.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Visits every entry in shard order.
    ///
    /// Shards stay read-locked while `f` runs; `f` must not write to this store.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for r in self.entries.iter() {
            f(r.key(), r.value());
        }
    }
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    /// Stores `new` only if `key` currently maps to `expected`.
    pub fn replace_if_eq(&self, key: &K, expected: &V, new: V) -> bool {
        match self.entries.get_mut(key) {
            Some(mut current) if current.value() == expected => {
                *current.value_mut() = new;
                true
            }
            _ => false,
        }
    }
}

// == Parallel Bulk Traversals ==
/// Bulk traversals run on rayon once the store holds at least `threshold`
/// entries and sequentially below it.
impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn runs_parallel(&self, threshold: usize) -> bool {
        self.entries.len() >= threshold
    }

    /// Visits every entry, possibly from several threads.
    pub fn for_each_parallel<F>(&self, threshold: usize, f: F)
    where
        F: Fn(&K, &V) + Send + Sync,
    {
        if self.runs_parallel(threshold) {
            self.entries.par_iter().for_each(|r| f(r.key(), r.value()));
        } else {
            self.entries.iter().for_each(|r| f(r.key(), r.value()));
        }
    }

    /// Folds `transform` results with `reduce`; entries mapped to `None` are
    /// skipped. Returns `None` when nothing was produced.
    pub fn reduce_parallel<U, T, R>(&self, threshold: usize, transform: T, reduce: R) -> Option<U>
    where
        U: Send,
        T: Fn(&K, &V) -> Option<U> + Send + Sync,
        R: Fn(U, U) -> U + Send + Sync,
    {
        if self.runs_parallel(threshold) {
            self.entries
                .par_iter()
                .filter_map(|r| transform(r.key(), r.value()))
                .reduce_with(|a, b| reduce(a, b))
        } else {
            self.entries
                .iter()
                .filter_map(|r| transform(r.key(), r.value()))
                .reduce(|a, b| reduce(a, b))
        }
    }

    /// Returns the first non-`None` result of `f`; with parallel execution,
    /// which match wins is unspecified.
    pub fn search_parallel<U, F>(&self, threshold: usize, f: F) -> Option<U>
    where
        U: Send,
        F: Fn(&K, &V) -> Option<U> + Send + Sync,
    {
        if self.runs_parallel(threshold) {
            self.entries
                .par_iter()
                .find_map_any(|r| f(r.key(), r.value()))
        } else {
            self.entries.iter().find_map(|r| f(r.key(), r.value()))
        }
    }
}
