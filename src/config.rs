//! Configuration Module
//!
//! Cache sizing/cleanup parameters and the server configuration loaded from
//! environment variables.

use std::env;

use crate::error::{CacheError, Result};

// == Cache Config ==
/// Immutable construction-time parameters of a bounded cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Sizing hint for the underlying store
    pub initial_capacity: usize,
    /// Hard ceiling; a cleanup pass above it evicts
    pub max_capacity: usize,
    /// Target size after eviction, also the on-write trigger threshold
    pub evict_to_capacity: usize,
    /// Periodic sweep interval in seconds, `0` disables periodic sweeps
    pub cleanup_interval_secs: u64,
}

impl CacheConfig {
    /// Creates a validated configuration.
    ///
    /// Fails when `max_capacity` is zero or when `evict_to_capacity` is larger
    /// than `max_capacity`.
    pub fn new(
        initial_capacity: usize,
        max_capacity: usize,
        evict_to_capacity: usize,
        cleanup_interval_secs: u64,
    ) -> Result<Self> {
        let config = Self {
            initial_capacity,
            max_capacity,
            evict_to_capacity,
            cleanup_interval_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants between the capacity fields.
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "max_capacity must be greater than zero".to_string(),
            ));
        }
        if self.evict_to_capacity > self.max_capacity {
            return Err(CacheError::InvalidConfig(format!(
                "evict_to_capacity ({}) exceeds max_capacity ({})",
                self.evict_to_capacity, self.max_capacity
            )));
        }
        Ok(())
    }

    /// Returns true if a periodic sweep is configured.
    pub fn has_periodic_cleanup(&self) -> bool {
        self.cleanup_interval_secs > 0
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial sizing hint for the cache store
    pub initial_capacity: usize,
    /// Hard ceiling on cache entries
    pub max_capacity: usize,
    /// Target entry count after an eviction pass
    pub evict_to_capacity: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `INITIAL_CAPACITY` - Store sizing hint (default: 64)
    /// - `MAX_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `EVICT_TO_CAPACITY` - Entries kept after eviction (default: 900)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            initial_capacity: env_or("INITIAL_CAPACITY", defaults.initial_capacity),
            max_capacity: env_or("MAX_CAPACITY", defaults.max_capacity),
            evict_to_capacity: env_or("EVICT_TO_CAPACITY", defaults.evict_to_capacity),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
        }
    }

    /// Builds the validated cache configuration from the server settings.
    pub fn cache_config(&self) -> Result<CacheConfig> {
        CacheConfig::new(
            self.initial_capacity,
            self.max_capacity,
            self.evict_to_capacity,
            self.cleanup_interval,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            max_capacity: 1000,
            evict_to_capacity: 900,
            default_ttl: 300,
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
