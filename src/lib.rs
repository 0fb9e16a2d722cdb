//! Bounded Cache - An in-process concurrent key-value cache
//!
//! Keeps itself near a configured size with single-flight background cleanup,
//! optional TTL sweeps and approximate LRU eviction. Ships with a small HTTP
//! server exposing one cache instance.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{BoundedCache, CacheBuilder, Expirable, TimedValue};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::{spawn_cleanup_task, CleanupOutcome, CleanupReport};
