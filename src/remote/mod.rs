//! Remote (L2) tier contract
//!
//! The cache engine only needs four operations from the shared store. Any
//! implementation must be safe to share across managers and tasks.

mod redis_store;

pub use redis_store::RedisStore;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Minimal key-value contract consumed by [`CacheManager`](crate::CacheManager)
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch raw bytes; `Ok(None)` when the key is not present
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store raw bytes with a time-to-live
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Reachability probe
    async fn ping(&self) -> Result<()>;
}
