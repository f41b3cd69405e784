//! Request DTOs for the pool server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

/// Request body for PUT /items/:key
///
/// # Fields
/// - `value`: Any JSON value
/// - `ttl`: Lifetime in seconds; 0 means never expire, absent means the pool default
/// - `deferred`: Queue the item for the next commit instead of saving now
#[derive(Debug, Clone, Deserialize)]
pub struct PutItemRequest {
    /// The value to store
    pub value: Value,
    /// Optional lifetime in seconds
    #[serde(default)]
    pub ttl: Option<i64>,
    /// Save deferred instead of immediately
    #[serde(default)]
    pub deferred: bool,
}

impl PutItemRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match self.ttl {
            Some(ttl) if ttl < 0 => Some("TTL cannot be negative".to_string()),
            _ => None,
        }
    }
}
