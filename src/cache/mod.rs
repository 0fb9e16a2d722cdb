//! Cache Module
//!
//! Concurrent bounded caching with TTL sweeps and approximate LRU eviction.

mod bounded;
mod expirable;
mod policy;
mod recency;
mod stats;
mod store;


// Re-export public types
pub use bounded::{BoundedCache, CacheBuilder, Lookup};
pub use expirable::{current_timestamp_ms, Expirable, TimedValue};
pub use policy::{
    ArbitraryOrder, EvictExpired, LeastRecentlyTouched, NeverEvict, NormalEviction, VictimSelector,
};
pub use recency::{RecencyTracker, Touch};
pub use stats::{CacheStats, StatsRecorder};
pub use store::EntryStore;
