//! Multi-tier cache orchestration
//!
//! [`CacheManager`] resolves the configured [`CacheStrategy`] into one of
//! three algorithms and runs it over the in-process tier and an optional
//! [`RemoteStore`].
//!
//! ## Read path
//!
//! | Mode | Lookup order |
//! |------|--------------|
//! | local-only | L1 |
//! | remote-only | L2 |
//! | layered | L1, then L2 with promotion into L1 on a hit |
//!
//! Remote failures on the read path are reported to the caller as a plain
//! [`CacheError::Miss`]. They stay visible in [`CacheMetrics::remote_errors`]
//! and in [`CacheManager::health`].
//!
//! ## Write path
//!
//! In layered mode the local write happens first and is never rolled back.
//! An error from [`CacheManager::set`] therefore means "the remote write
//! failed", not "nothing was cached".

use crate::cache::{
    codec,
    store::InProcessCache,
    strategy::{CacheStrategy, StrategyKind},
    types::CacheStats,
};
use crate::config::{CacheConfig, RemoteConfig};
use crate::error::{CacheError, Result};
use crate::health::{HealthReport, HealthStatus, TierHealth};
use crate::remote::{RedisStore, RemoteStore};
use crate::subsystem::Subsystem;
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// State of the remote tier as decided at startup
#[derive(Debug, Clone)]
enum RemoteState {
    /// The effective mode never consults the remote tier
    Unused,
    /// The strategy needs a remote tier but none was configured
    NotConfigured,
    /// The startup probe succeeded
    Connected,
    /// The startup probe failed; the handle was dropped
    Unavailable(String),
}

#[derive(Debug, Default)]
struct ManagerCounters {
    local_hits: AtomicU64,
    remote_hits: AtomicU64,
    misses: AtomicU64,
    remote_errors: AtomicU64,
    promotions: AtomicU64,
    set_failures: AtomicU64,
}

fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

/// Metrics snapshot of a cache manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub configured_mode: StrategyKind,
    pub effective_mode: StrategyKind,
    /// Whether a live remote handle is in use
    pub remote_available: bool,
    /// In-process tier statistics (item count, capacity, evictions, ...)
    pub local: CacheStats,
    pub local_hits: u64,
    pub remote_hits: u64,
    /// Reads answered with a miss, including those caused by remote errors
    pub misses: u64,
    /// Remote failures of any operation (connection, command, timeout)
    pub remote_errors: u64,
    /// Remote hits copied into the local tier
    pub promotions: u64,
    pub set_failures: u64,
}

impl CacheMetrics {
    /// Hit rate across both tiers as a percentage
    pub fn hit_rate(&self) -> f64 {
        let hits = self.local_hits + self.remote_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// Multi-tier cache manager
///
/// Constructed explicitly and passed to whoever needs it; there is no
/// process-wide instance. Lifecycle is `new → start → stop`.
///
/// ```no_run
/// use hub_cache::{CacheConfig, CacheManager, CacheStrategy};
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = CacheConfig::builder()
///     .strategy(CacheStrategy::local_only())
///     .build();
///
/// let cache: CacheManager<String> = CacheManager::new(config).await?;
/// cache.start().await;
///
/// cache.set("greeting", "hello".to_string(), Duration::ZERO).await?;
/// assert_eq!(cache.get("greeting").await?, "hello");
///
/// cache.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct CacheManager<V = serde_json::Value> {
    strategy: CacheStrategy,

    /// Mode actually running
    mode: StrategyKind,

    local: InProcessCache<V>,

    remote: Option<Arc<dyn RemoteStore>>,

    remote_state: RemoteState,

    /// Deadline applied to every remote call
    remote_timeout: Duration,

    counters: ManagerCounters,
}

impl<V> CacheManager<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Build a manager, connecting to Redis when `config.remote` is set
    ///
    /// A failed connection is handled like a failed reachability probe:
    /// local-only with `fallback_on_remote_failure`, an error otherwise.
    pub async fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let wants_remote = config.resolved_strategy().kind.uses_remote();
        let remote = match (&config.remote, wants_remote) {
            (Some(remote_config), true) => Some(
                RedisStore::connect(remote_config)
                    .await
                    .map(|store| Arc::new(store) as Arc<dyn RemoteStore>),
            ),
            _ => None,
        };

        Self::assemble(config, remote).await
    }

    /// Build a manager over an existing remote handle
    ///
    /// The handle may be shared with other managers.
    pub async fn with_remote(config: CacheConfig, remote: Arc<dyn RemoteStore>) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, Some(Ok(remote))).await
    }

    async fn assemble(
        config: CacheConfig,
        remote: Option<Result<Arc<dyn RemoteStore>>>,
    ) -> Result<Self> {
        let strategy = config.resolved_strategy();
        let remote_timeout = config
            .remote
            .as_ref()
            .map(|r| r.op_timeout)
            .unwrap_or_else(|| RemoteConfig::default().op_timeout);

        let local = InProcessCache::new(config.local.clone())?;

        let (remote, remote_state) = if !strategy.kind.uses_remote() {
            (None, RemoteState::Unused)
        } else {
            match remote {
                None => (None, RemoteState::NotConfigured),
                Some(Err(e)) => (None, RemoteState::Unavailable(e.to_string())),
                Some(Ok(handle)) => {
                    match with_deadline(remote_timeout, "startup ping", handle.ping()).await {
                        Ok(()) => (Some(handle), RemoteState::Connected),
                        Err(e) => (None, RemoteState::Unavailable(e.to_string())),
                    }
                }
            }
        };

        let mode = match &remote_state {
            RemoteState::Unused | RemoteState::Connected => strategy.kind,
            RemoteState::NotConfigured => {
                if !strategy.fallback_on_remote_failure {
                    error!("Cache strategy {} requires a remote tier", strategy.kind);
                    return Err(CacheError::Config(format!(
                        "strategy {} requires a remote tier but none is configured",
                        strategy.kind
                    )));
                }
                warn!(
                    "Cache strategy {} has no remote tier configured, running local-only",
                    strategy.kind
                );
                StrategyKind::LocalOnly
            }
            RemoteState::Unavailable(reason) => {
                if !strategy.fallback_on_remote_failure {
                    error!("Remote cache tier unreachable at startup: {}", reason);
                    return Err(CacheError::RemoteUnavailable(reason.clone()));
                }
                warn!(
                    "Remote cache tier unreachable at startup, falling back to local-only: {}",
                    reason
                );
                StrategyKind::LocalOnly
            }
        };

        info!(
            "Cache manager ready (configured: {}, effective: {}, local capacity: {})",
            strategy.kind,
            mode,
            local.capacity()
        );

        Ok(Self {
            strategy,
            mode,
            local,
            remote,
            remote_state,
            remote_timeout,
            counters: ManagerCounters::default(),
        })
    }

    /// Start background work (the local tier's sweep)
    pub async fn start(&self) {
        if self.mode.uses_local() {
            self.local.start().await;
        }
    }

    /// Stop background work; the manager keeps serving afterwards
    pub async fn stop(&self) {
        self.local.stop().await;
    }

    /// Look up `key`
    ///
    /// Returns [`CacheError::Miss`] when the value is absent, expired, or
    /// the remote tier failed. A value that cannot be decoded returns
    /// [`CacheError::Serialization`].
    pub async fn get(&self, key: &str) -> Result<V> {
        match self.mode {
            StrategyKind::LocalOnly => self.get_local(key).await,
            StrategyKind::RemoteOnly => self.get_remote(key).await,
            StrategyKind::Layered => {
                if let Some(value) = self.local.get(key).await {
                    incr(&self.counters.local_hits);
                    return Ok(value);
                }

                let value = self.get_remote(key).await?;

                self.local
                    .set(key, value.clone(), self.strategy.promotion_ttl())
                    .await;
                incr(&self.counters.promotions);
                debug!("Promoted remote hit into local tier: {}", key);

                Ok(value)
            }
        }
    }

    /// Store `value` under `key`
    ///
    /// `ttl` of zero selects the strategy defaults. In layered mode the
    /// remote write's error is returned even though the local write has
    /// already happened.
    pub async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        match self.mode {
            StrategyKind::LocalOnly => {
                let local_ttl = self.strategy.resolve_local_ttl(self.mode, ttl);
                self.local.set(key, value, local_ttl).await;
                Ok(())
            }
            StrategyKind::RemoteOnly => {
                let bytes = codec::encode(&value)?;
                self.set_remote(key, bytes, ttl).await
            }
            StrategyKind::Layered => {
                let bytes = codec::encode(&value)?;
                let local_ttl = self.strategy.resolve_local_ttl(self.mode, ttl);
                self.local.set(key, value, local_ttl).await;
                self.set_remote(key, bytes, ttl).await
            }
        }
    }

    /// Remove `key` from every tier in use
    ///
    /// Local deletion cannot fail; only the remote error is returned.
    pub async fn delete(&self, key: &str) -> Result<()> {
        if self.mode.uses_local() {
            self.local.delete(key).await;
        }

        if !self.mode.uses_remote() {
            return Ok(());
        }

        let Some(remote) = &self.remote else {
            return Ok(());
        };

        with_deadline(self.remote_timeout, "remote delete", remote.delete(key))
            .await
            .map_err(|e| {
                incr(&self.counters.remote_errors);
                warn!(key = %key, error = %e, "Remote cache delete failed");
                e
            })
    }

    /// Report tier health
    ///
    /// Probes the remote tier when one is in use. The result never affects
    /// request handling.
    pub async fn health(&self) -> HealthReport {
        // The local tier exists whenever construction succeeded
        let local = TierHealth::healthy(None);

        let remote = match (&self.remote_state, &self.remote) {
            (RemoteState::Unused, _) => None,
            (RemoteState::NotConfigured, _) => Some(TierHealth::failed(
                HealthStatus::Degraded,
                None,
                "remote tier required by strategy but not configured",
            )),
            (RemoteState::Unavailable(reason), _) => Some(TierHealth::failed(
                HealthStatus::Degraded,
                None,
                &format!("unreachable at startup: {}", reason),
            )),
            (RemoteState::Connected, Some(handle)) => {
                let start = Instant::now();
                match with_deadline(self.remote_timeout, "health ping", handle.ping()).await {
                    Ok(()) => Some(TierHealth::healthy(Some(start.elapsed()))),
                    Err(e) => {
                        let status = if self.mode == StrategyKind::RemoteOnly {
                            HealthStatus::Unhealthy
                        } else {
                            HealthStatus::Degraded
                        };
                        warn!("Remote cache tier health check failed: {}", e);
                        Some(TierHealth::failed(status, Some(start.elapsed()), &e.to_string()))
                    }
                }
            }
            (RemoteState::Connected, None) => Some(TierHealth::failed(
                HealthStatus::Unhealthy,
                None,
                "remote handle missing",
            )),
        };

        let status = remote
            .as_ref()
            .map(|r| local.status.worst(r.status))
            .unwrap_or(local.status);

        HealthReport {
            status,
            configured_mode: self.strategy.kind,
            effective_mode: self.mode,
            local,
            remote,
            timestamp: Utc::now(),
        }
    }

    /// Metrics snapshot
    pub async fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            configured_mode: self.strategy.kind,
            effective_mode: self.mode,
            remote_available: self.remote.is_some(),
            local: self.local.stats().await,
            local_hits: load(&self.counters.local_hits),
            remote_hits: load(&self.counters.remote_hits),
            misses: load(&self.counters.misses),
            remote_errors: load(&self.counters.remote_errors),
            promotions: load(&self.counters.promotions),
            set_failures: load(&self.counters.set_failures),
        }
    }

    /// Mode actually running
    pub fn mode(&self) -> StrategyKind {
        self.mode
    }

    /// Strategy as configured
    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    /// Whether a live remote handle is in use
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// The in-process tier
    pub fn local_tier(&self) -> &InProcessCache<V> {
        &self.local
    }

    async fn get_local(&self, key: &str) -> Result<V> {
        match self.local.get(key).await {
            Some(value) => {
                incr(&self.counters.local_hits);
                Ok(value)
            }
            None => {
                incr(&self.counters.misses);
                Err(CacheError::miss(key))
            }
        }
    }

    async fn get_remote(&self, key: &str) -> Result<V> {
        let Some(remote) = &self.remote else {
            incr(&self.counters.misses);
            return Err(CacheError::miss(key));
        };

        match with_deadline(self.remote_timeout, "remote get", remote.get(key)).await {
            Ok(Some(bytes)) => {
                let value = codec::decode(&bytes)?;
                incr(&self.counters.remote_hits);
                debug!("Remote cache hit: {}", key);
                Ok(value)
            }
            Ok(None) => {
                incr(&self.counters.misses);
                debug!("Remote cache miss: {}", key);
                Err(CacheError::miss(key))
            }
            Err(e) => {
                incr(&self.counters.remote_errors);
                incr(&self.counters.misses);
                warn!(key = %key, error = %e, "Remote cache get failed, treating as miss");
                Err(CacheError::miss(key))
            }
        }
    }

    async fn set_remote(&self, key: &str, bytes: Vec<u8>, ttl_override: Duration) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Err(CacheError::Config(format!(
                "mode {} has no remote tier",
                self.mode
            )));
        };

        let ttl = self.strategy.resolve_remote_ttl(ttl_override);
        with_deadline(self.remote_timeout, "remote set", remote.set(key, bytes, ttl))
            .await
            .map_err(|e| {
                incr(&self.counters.remote_errors);
                incr(&self.counters.set_failures);
                warn!(key = %key, error = %e, "Remote cache set failed");
                e
            })
    }
}

/// Run a remote call under `deadline`
async fn with_deadline<T>(
    deadline: Duration,
    context: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout {
            timeout_ms: deadline.as_millis() as u64,
            context: context.to_string(),
        }),
    }
}

#[async_trait]
impl<V> Subsystem for CacheManager<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "cache"
    }

    async fn start(&self) -> Result<()> {
        CacheManager::start(self).await;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        CacheManager::stop(self).await;
        Ok(())
    }

    async fn health(&self) -> HealthStatus {
        CacheManager::health(self).await.status
    }

    async fn metrics(&self) -> serde_json::Value {
        serde_json::to_value(CacheManager::metrics(self).await).unwrap_or(serde_json::Value::Null)
    }
}
