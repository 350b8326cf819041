//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Storage Error Enum ==
/// Errors raised by a table backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Lock contention, constraint race or a failed write the next call may not hit
    #[error("Transient storage failure: {0}")]
    Transient(String),

    /// The backing store cannot be opened or read
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The table does not have the expected shape
    #[error("Schema mismatch: {0}")]
    Schema(String),
}

impl StorageError {
    /// Returns true for failures a cache write is allowed to drop silently.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

// == Cache Error Enum ==
/// Unified error type for the cache and its HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Error propagated from the table backend
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Stored value could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// JSON document could not be parsed or rendered
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is longer than the column allows
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key missing or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidKey(_) | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Storage(StorageError::Unavailable(_))
            | CacheError::Storage(StorageError::Transient(_)) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Storage(StorageError::Schema(_))
            | CacheError::Encoding(_)
            | CacheError::Serialization(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Aliases ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result type returned by table backends.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
