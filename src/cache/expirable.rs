//! Expirable Values Module
//!
//! The capability a value type implements to take part in TTL sweeps, plus a
//! ready-made wrapper carrying an expiration timestamp.

// == Expirable ==
/// A value that can report whether it has outlived its time-to-live.
pub trait Expirable {
    /// Returns true once the value should be dropped by a TTL sweep.
    fn is_expired(&self) -> bool;
}

// == Timed Value ==
/// A value paired with creation and optional expiration timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedValue<V> {
    /// The stored value
    pub value: V,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<i64>,
}

impl<V> TimedValue<V> {
    // == Constructor ==
    /// Wraps `value` with an optional TTL in seconds.
    pub fn new(value: V, ttl_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_seconds.map(|ttl| now.saturating_add((ttl as i64).saturating_mul(1000)));

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    /// Wraps `value` with no expiration.
    pub fn permanent(value: V) -> Self {
        Self::new(value, None)
    }

    /// Wraps `value` so that it expires at the given Unix millisecond timestamp.
    pub fn expiring_at(value: V, expires_at: i64) -> Self {
        Self {
            value,
            created_at: current_timestamp_ms(),
            expires_at: Some(expires_at),
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// Returns `Some(0)` once the value has expired.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            if expires > now {
                (expires - now) as u64
            } else {
                0
            }
        })
    }

    /// Returns remaining TTL in whole seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| ms / 1000)
    }
}

impl<V> Expirable for TimedValue<V> {
    /// Expired once the current time is greater than or equal to `expires_at`.
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
