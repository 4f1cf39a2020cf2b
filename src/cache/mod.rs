//! # Multi-Tier Caching
//!
//! A fast in-process tier (L1) in front of an optional shared remote tier
//! (L2), combined according to a [`CacheStrategy`].
//!
//! ## Features
//!
//! - **TTL-Based Expiration**: every entry carries an absolute expiry time
//! - **LRU Eviction**: bounded local tier, least recently used entry goes first
//! - **Background Sweep**: periodic removal of expired entries, restartable
//! - **Layered Reads**: remote hits are promoted into the local tier
//! - **Startup Fallback**: continue local-only when the remote tier is down
//!
//! ## Example
//!
//! ```rust
//! use hub_cache::cache::{InProcessCache, LocalCacheConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = LocalCacheConfig::builder()
//!     .max_size(1_000)
//!     .sweep_interval(Duration::from_secs(30))
//!     .build();
//!
//! let cache: InProcessCache<String> = InProcessCache::new(config)?;
//! cache.start().await;
//!
//! cache.set("query:123", "cached response".to_string(), Duration::from_secs(60)).await;
//!
//! if let Some(value) = cache.get("query:123").await {
//!     println!("Cache hit: {}", value);
//! }
//!
//! cache.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod entry;
pub mod manager;
pub mod store;
pub mod strategy;
pub mod types;

pub use config::{LocalCacheConfig, LocalCacheConfigBuilder};
pub use entry::CacheItem;
pub use manager::{CacheManager, CacheMetrics};
pub use store::InProcessCache;
pub use strategy::{CacheStrategy, StrategyKind};
pub use types::{CacheKey, CacheStats};
