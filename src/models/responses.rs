//! Response DTOs for the pool server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheItem, PoolStats};

/// Response body for GET /items/:key
#[derive(Debug, Clone, Serialize)]
pub struct ItemResponse {
    /// The requested key
    pub key: String,
    /// The value, null on a miss
    pub value: Option<Value>,
    /// Whether the item is a hit
    pub hit: bool,
    /// Expiration instant in RFC 3339, null when the item never expires
    pub expires_at: Option<String>,
}

impl ItemResponse {
    /// Creates an ItemResponse describing `item`
    pub fn from_item(item: &CacheItem<Value>) -> Self {
        Self {
            key: item.key().to_string(),
            value: item.get().cloned(),
            hit: item.is_hit(),
            expires_at: item.expiry().map(|at| at.to_rfc3339()),
        }
    }
}

/// Response body for PUT /items/:key
#[derive(Debug, Clone, Serialize)]
pub struct SaveResponse {
    /// The key that was saved
    pub key: String,
    /// Whether the pool accepted the item
    pub saved: bool,
    /// Whether the item awaits a commit
    pub deferred: bool,
}

impl SaveResponse {
    pub fn new(key: impl Into<String>, saved: bool, deferred: bool) -> Self {
        Self {
            key: key.into(),
            saved,
            deferred,
        }
    }
}

/// Response body for DELETE /items/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// The key that was deleted
    pub key: String,
    /// Whether the key is absent afterwards
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, deleted: bool) -> Self {
        Self {
            key: key.into(),
            deleted,
        }
    }
}

/// Response body for POST /commit
#[derive(Debug, Clone, Serialize)]
pub struct CommitResponse {
    /// Whether every deferred item was saved
    pub committed: bool,
}

/// Response body for DELETE /items
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Whether the pool and its medium were cleared
    pub cleared: bool,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of lookups that hit
    pub hits: u64,
    /// Number of lookups that missed
    pub misses: u64,
    /// Number of stale items evicted on read
    pub evictions: u64,
    /// Number of saves the medium refused
    pub write_failures: u64,
    /// Items currently committed
    pub committed: usize,
    /// Items currently deferred
    pub deferred: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<PoolStats> for StatsResponse {
    fn from(stats: PoolStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            write_failures: stats.write_failures,
            committed: stats.committed,
            deferred: stats.deferred,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Strategy backing the pool
    pub strategy: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(strategy: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            strategy: strategy.into(),
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
