//! Error types for cache operations
//!
//! This module defines the error taxonomy of the hub-cache library. A cache
//! miss is modelled as an error variant so that `CacheManager::get` can return
//! the decoded value directly, but it is an expected outcome and never an
//! operational failure.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired in every tier consulted
    #[error("Cache miss: {key}")]
    Miss { key: String },

    /// Remote tier could not be reached at all (connection level)
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Remote tier was reached but the command failed
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Remote operation exceeded its deadline
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration or a required tier is missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl CacheError {
    /// Build a miss error for `key`
    pub fn miss(key: impl Into<String>) -> Self {
        CacheError::Miss { key: key.into() }
    }

    /// True for the expected "not cached" outcome
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss { .. })
    }

    /// True for any failure that originated in the remote tier
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            CacheError::RemoteUnavailable(_) | CacheError::Remote(_) | CacheError::Timeout { .. }
        )
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            CacheError::RemoteUnavailable(e.to_string())
        } else if e.is_timeout() {
            CacheError::Timeout {
                timeout_ms: 0,
                context: e.to_string(),
            }
        } else {
            CacheError::Remote(e.to_string())
        }
    }
}
