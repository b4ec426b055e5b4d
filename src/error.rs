//! Error types for the cache
//!
//! Provides unified error handling using thiserror. A cache miss is not an
//! error and never appears here; see [`crate::cache::Lookup`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache and its storage backends.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend reported a failure (unreachable, rejected write, ...)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Backend file or socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache configuration is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found in cache (HTTP surface only)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The cache has been stopped
    #[error("Cache has been stopped")]
    Stopped,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for failures raised by the storage backend itself.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            CacheError::Storage(_) | CacheError::Io(_) | CacheError::Serialization(_)
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Storage(_)
            | CacheError::Io(_)
            | CacheError::Serialization(_)
            | CacheError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::InvalidConfig(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
