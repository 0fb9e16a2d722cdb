//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{BoundedCache, Lookup, TimedValue};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    CleanupResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};
use crate::tasks::CleanupOutcome;

/// Cache type served over HTTP.
pub type ServedCache = BoundedCache<String, TimedValue<String>>;

/// Application state shared across all handlers.
///
/// The cache handle is internally synchronized, so no outer lock is needed.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache handle
    pub cache: ServedCache,
    /// TTL in seconds applied when a request does not carry one
    pub default_ttl: u64,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: ServedCache, default_ttl: u64) -> Self {
        Self { cache, default_ttl }
    }

    /// Builds an expiring LRU cache from configuration.
    ///
    /// Must run inside a tokio runtime when a cleanup interval is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = BoundedCache::expiring_lru(config.cache_config()?)?;
        Ok(Self::new(cache, config.default_ttl))
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.unwrap_or(state.default_ttl);
    state
        .cache
        .put(req.key.clone(), TimedValue::new(req.value, Some(ttl)));

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key. An expired value is dropped on
/// read instead of waiting for the next sweep.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get_live(&key) {
        Lookup::Live(timed) => {
            let ttl = timed.ttl_remaining();
            Ok(Json(GetResponse::new(key, timed.value, ttl)))
        }
        Lookup::Expired => Err(CacheError::Expired(key)),
        Lookup::Absent => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state
        .cache
        .remove(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.stats(), state.cache.config()))
}

/// Handler for POST /cleanup
///
/// Attempts a cleanup pass on the blocking pool and reports what it did.
pub async fn cleanup_handler(State(state): State<AppState>) -> Result<Json<CleanupResponse>> {
    let cache = state.cache.clone();
    let outcome: CleanupOutcome = tokio::task::spawn_blocking(move || cache.force_cleanup())
        .await
        .map_err(|e| CacheError::Internal(format!("cleanup pass failed: {e}")))?;

    Ok(Json(CleanupResponse::new(outcome)))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
