//! Error types for cache pools
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for pools, media and the strategy registry.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key does not match `[A-Za-z0-9._]{1,64}`
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Bad constructor or registry argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Medium unreachable or misconfigured at construction time
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A medium read/write/delete failed for a reason other than "not found"
    #[error("Storage error: {0}")]
    Storage(String),

    /// Item could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No strategy registered under the requested name
    #[error("Unknown cache strategy: {0}")]
    UnknownStrategy(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) | CacheError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CacheError::UnknownStrategy(_) => StatusCode::NOT_FOUND,
            CacheError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Storage(_) => StatusCode::BAD_GATEWAY,
            CacheError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache pools.
pub type Result<T> = std::result::Result<T, CacheError>;
