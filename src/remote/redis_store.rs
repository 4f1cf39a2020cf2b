//! Redis-backed remote tier

use super::RemoteStore;
use crate::config::RemoteConfig;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

/// Remote store backed by a Redis server
///
/// Wraps a multiplexed [`ConnectionManager`], which reconnects on its own and
/// is cheap to clone, so one `RedisStore` can be shared by many managers.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    endpoint: String,
}

impl RedisStore {
    /// Connect to the Redis server described by `config`
    ///
    /// Fails with [`CacheError::RemoteUnavailable`] if no connection can be
    /// established within `connect_timeout`.
    pub async fn connect(config: &RemoteConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        info!("Connecting to Redis at {} (db: {})", endpoint, config.db);

        let client = redis::Client::open(config.url())
            .map_err(|e| CacheError::Config(format!("invalid redis url: {}", e)))?;

        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                CacheError::RemoteUnavailable(format!(
                    "connecting to {} timed out after {:?}",
                    endpoint, config.connect_timeout
                ))
            })?
            .map_err(|e| CacheError::RemoteUnavailable(format!("{}: {}", endpoint, e)))?;

        info!("Successfully connected to Redis at {}", endpoint);

        Ok(Self { conn, endpoint })
    }

    /// Wrap an existing connection manager
    pub fn from_connection(conn: ConnectionManager, endpoint: impl Into<String>) -> Self {
        Self {
            conn,
            endpoint: endpoint.into(),
        }
    }

    /// `host:port` this store talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        debug!(key = %key, found = value.is_some(), "redis GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // PX takes milliseconds and rejects 0
        let ttl_ms = ttl.as_millis().clamp(1, u64::MAX as u128) as u64;

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        debug!(key = %key, ttl_ms, "redis SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        debug!(key = %key, "redis DEL");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;

        if pong.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(CacheError::Remote(format!("unexpected PING reply: {}", pong)))
        }
    }
}
