//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::config::CacheConfig;
use crate::tasks::CleanupOutcome;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: String,
    /// Remaining TTL in seconds, absent for values that never expire
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl: Option<u64>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Entries removed for being over capacity
    pub evictions: u64,
    /// Entries removed by TTL sweeps
    pub expirations: u64,
    /// Completed cleanup passes
    pub cleanup_runs: u64,
    /// Cleanup attempts skipped because a pass was running
    pub cleanup_skipped: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Configured hard ceiling
    pub max_capacity: usize,
    /// Configured post-eviction target
    pub evict_to_capacity: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a stats snapshot and the cache limits
    pub fn new(stats: CacheStats, config: &CacheConfig) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            cleanup_runs: stats.cleanup_runs,
            cleanup_skipped: stats.cleanup_skipped,
            total_entries: stats.total_entries,
            max_capacity: config.max_capacity,
            evict_to_capacity: config.evict_to_capacity,
        }
    }
}

/// Response body for the cleanup endpoint (POST /cleanup)
#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    /// "completed" or "skipped"
    pub status: String,
    /// Entries removed by the TTL sweep
    pub expired: usize,
    /// Entries removed for being over capacity
    pub evicted: usize,
    /// Entries left after the pass, absent when skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<usize>,
}

impl CleanupResponse {
    /// Creates a new CleanupResponse from a cleanup outcome
    pub fn new(outcome: CleanupOutcome) -> Self {
        match outcome {
            CleanupOutcome::Completed(report) => Self {
                status: "completed".to_string(),
                expired: report.expired,
                evicted: report.evicted,
                remaining: Some(report.remaining),
            },
            CleanupOutcome::Skipped => Self {
                status: "skipped".to_string(),
                expired: 0,
                evicted: 0,
                remaining: None,
            },
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::CleanupReport;

    #[test]
    fn test_get_response_serialize() {
        let resp = GetResponse::new("test_key", "test_value", None);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("test_key"));
        assert!(json.contains("test_value"));
        assert!(!json.contains("ttl"));
    }

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("successfully"));
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            total_entries: 100,
            ..CacheStats::default()
        };
        let config = CacheConfig::new(0, 200, 150, 0).unwrap();
        let resp = StatsResponse::new(stats, &config);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.max_capacity, 200);
    }

    #[test]
    fn test_cleanup_response_from_outcome() {
        let done = CleanupResponse::new(CleanupOutcome::Completed(CleanupReport {
            expired: 1,
            evicted: 2,
            remaining: 3,
        }));
        assert_eq!(done.status, "completed");
        assert_eq!(done.remaining, Some(3));

        let skipped = CleanupResponse::new(CleanupOutcome::Skipped);
        assert_eq!(skipped.status, "skipped");
        let json = serde_json::to_string(&skipped).unwrap();
        assert!(!json.contains("remaining"));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("Something went wrong"));
    }
}
