//! # Hub Cache (hub-cache)
//!
//! Multi-tier caching for hub services: a bounded in-process tier backed by
//! an optional shared Redis tier.
//!
//! ## Features
//!
//! - Three strategies: layered, remote-only and local-only
//! - Async-first design using tokio
//! - TTL expiry with LRU eviction and a background sweep
//! - Fallback to local-only when Redis is unreachable at startup
//! - Health reporting that never blocks serving
//!
//! ## Layered Cache
//!
//! ```no_run
//! use hub_cache::{CacheConfig, CacheManager, RemoteConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CacheConfig::builder()
//!         .remote(RemoteConfig::new("localhost", 6379))
//!         .build();
//!
//!     let cache: CacheManager = CacheManager::new(config).await?;
//!     cache.start().await;
//!
//!     cache
//!         .set("user:42", serde_json::json!({ "name": "Ada" }), Duration::ZERO)
//!         .await?;
//!     let user = cache.get("user:42").await?;
//!     println!("Cached user: {}", user);
//!
//!     let health = cache.health().await;
//!     println!("Cache status: {:?} ({})", health.status, health.effective_mode);
//!
//!     cache.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration From Environment
//!
//! ```no_run
//! use hub_cache::{CacheConfig, CacheManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // HUB_CACHE_STRATEGY=local-only HUB_CACHE_MAX_SIZE=500 ...
//!     let config = CacheConfig::from_env()?;
//!     let cache: CacheManager<String> = CacheManager::new(config).await?;
//!     println!("Running {}", cache.mode());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod remote;
pub mod subsystem;

// Re-export main types for convenience
pub use cache::{
    CacheKey, CacheManager, CacheMetrics, CacheStats, CacheStrategy, InProcessCache,
    LocalCacheConfig, StrategyKind,
};
pub use config::{CacheConfig, CacheConfigBuilder, RemoteConfig};
pub use error::{CacheError, Result};
pub use health::{HealthReport, HealthStatus, TierHealth};
pub use remote::{RedisStore, RemoteStore};
pub use subsystem::Subsystem;
