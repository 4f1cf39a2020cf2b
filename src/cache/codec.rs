//! Value encoding for the remote tier

use crate::error::{CacheError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Serialize a value into the bytes stored remotely
pub fn encode<V: Serialize>(value: &V) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Deserialize bytes read from the remote tier
pub fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
}
