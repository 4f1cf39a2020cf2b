//! Top-level cache configuration
//!
//! The hub's own loader normally builds a [`CacheConfig`] (it derives serde
//! for that purpose). [`CacheConfig::from_env`] covers standalone use.

use crate::cache::{CacheStrategy, LocalCacheConfig, StrategyKind};
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Connection parameters for the remote (Redis) tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,

    pub port: u16,

    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Logical database index
    pub db: i64,

    /// Deadline for establishing the connection at startup
    pub connect_timeout: Duration,

    /// Deadline for each remote get/set/delete/ping
    pub op_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
            connect_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_secs(2),
        }
    }
}

impl RemoteConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Connection URL understood by the redis client
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// `host:port`, safe to log
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(CacheError::Config("remote host must not be empty".to_string()));
        }

        if self.op_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(CacheError::Config(
                "remote timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Complete configuration for a [`CacheManager`](crate::CacheManager)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Caching strategy; `None` selects the layered default
    pub strategy: Option<CacheStrategy>,

    /// In-process tier settings
    pub local: LocalCacheConfig,

    /// Remote tier connection; `None` means no remote tier is configured
    pub remote: Option<RemoteConfig>,
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Strategy in effect, defaulting to layered
    pub fn resolved_strategy(&self) -> CacheStrategy {
        self.strategy.clone().unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.resolved_strategy().validate()?;
        self.local.validate()?;
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        Ok(())
    }

    /// Load from `HUB_CACHE_*` environment variables, reading `.env` first
    /// if one exists
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `HUB_CACHE_STRATEGY` | `layered`, `remote-only` or `local-only` |
    /// | `HUB_CACHE_LOCAL_TTL_SECS` | local default TTL |
    /// | `HUB_CACHE_REMOTE_TTL_SECS` | remote default TTL |
    /// | `HUB_CACHE_FALLBACK` | continue local-only if Redis is down |
    /// | `HUB_CACHE_MAX_SIZE` | local capacity |
    /// | `HUB_CACHE_SWEEP_INTERVAL_SECS` | background sweep period |
    /// | `HUB_CACHE_REDIS_HOST` | enables the remote tier |
    /// | `HUB_CACHE_REDIS_PORT`, `HUB_CACHE_REDIS_PASSWORD`, `HUB_CACHE_REDIS_DB` | connection |
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |name: &str| -> Result<Option<String>> {
            Ok(lookup(name).filter(|v| !v.trim().is_empty()))
        };

        let mut config = CacheConfig::default();

        let kind = parse_var::<StrategyKind>(&parse, "HUB_CACHE_STRATEGY")?;
        let local_ttl = parse_var::<u64>(&parse, "HUB_CACHE_LOCAL_TTL_SECS")?;
        let remote_ttl = parse_var::<u64>(&parse, "HUB_CACHE_REMOTE_TTL_SECS")?;
        let fallback = parse_var::<bool>(&parse, "HUB_CACHE_FALLBACK")?;

        if kind.is_some() || local_ttl.is_some() || remote_ttl.is_some() || fallback.is_some() {
            let defaults = CacheStrategy::default();
            config.strategy = Some(CacheStrategy {
                kind: kind.unwrap_or(defaults.kind),
                local_ttl: local_ttl.map(Duration::from_secs).unwrap_or(defaults.local_ttl),
                remote_ttl: remote_ttl.map(Duration::from_secs).unwrap_or(defaults.remote_ttl),
                fallback_on_remote_failure: fallback
                    .unwrap_or(defaults.fallback_on_remote_failure),
            });
        }

        if let Some(max_size) = parse_var::<usize>(&parse, "HUB_CACHE_MAX_SIZE")? {
            config.local.max_size = max_size;
        }
        if let Some(secs) = parse_var::<u64>(&parse, "HUB_CACHE_SWEEP_INTERVAL_SECS")? {
            config.local.sweep_interval = Duration::from_secs(secs);
        }

        if let Some(host) = parse("HUB_CACHE_REDIS_HOST")? {
            let mut remote = RemoteConfig {
                host,
                ..Default::default()
            };
            if let Some(port) = parse_var::<u16>(&parse, "HUB_CACHE_REDIS_PORT")? {
                remote.port = port;
            }
            if let Some(db) = parse_var::<i64>(&parse, "HUB_CACHE_REDIS_DB")? {
                remote.db = db;
            }
            remote.password = parse("HUB_CACHE_REDIS_PASSWORD")?;
            config.remote = Some(remote);
        }

        config.validate()?;
        Ok(config)
    }

    /// Local-only preset with default capacity
    pub fn local_only() -> Self {
        Self {
            strategy: Some(CacheStrategy::local_only()),
            ..Default::default()
        }
    }

    /// Preset for memory-constrained environments
    pub fn small() -> Self {
        Self {
            local: LocalCacheConfig::small(),
            ..Default::default()
        }
    }
}

fn parse_var<T>(
    parse: &impl Fn(&str) -> Result<Option<String>>,
    name: &str,
) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match parse(name)? {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CacheError::Config(format!("invalid value for {}: {}", name, e))),
        None => Ok(None),
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    strategy: Option<CacheStrategy>,
    local: Option<LocalCacheConfig>,
    remote: Option<RemoteConfig>,
}

impl CacheConfigBuilder {
    pub fn strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn local(mut self, local: LocalCacheConfig) -> Self {
        self.local = Some(local);
        self
    }

    pub fn remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        CacheConfig {
            strategy: self.strategy,
            local: self.local.unwrap_or_default(),
            remote: self.remote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.strategy.is_none());
        assert!(config.remote.is_none());
        assert_eq!(config.resolved_strategy().kind, StrategyKind::Layered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_url() {
        let mut remote = RemoteConfig::new("cache.internal", 6380);
        assert_eq!(remote.url(), "redis://cache.internal:6380/0");

        remote.password = Some("s3cret".to_string());
        remote.db = 2;
        assert_eq!(remote.url(), "redis://:s3cret@cache.internal:6380/2");
        assert_eq!(remote.endpoint(), "cache.internal:6380");
    }

    #[test]
    fn test_password_is_not_serialized() {
        let mut remote = RemoteConfig::default();
        remote.password = Some("s3cret".to_string());
        let json = serde_json::to_string(&remote).unwrap();
        assert!(!json.contains("s3cret"));
    }

    #[test]
    fn test_from_lookup_empty() {
        let config = CacheConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_from_lookup_full() {
        let config = CacheConfig::from_lookup(lookup(&[
            ("HUB_CACHE_STRATEGY", "remote-only"),
            ("HUB_CACHE_REMOTE_TTL_SECS", "120"),
            ("HUB_CACHE_FALLBACK", "false"),
            ("HUB_CACHE_MAX_SIZE", "500"),
            ("HUB_CACHE_SWEEP_INTERVAL_SECS", "15"),
            ("HUB_CACHE_REDIS_HOST", "redis.local"),
            ("HUB_CACHE_REDIS_PORT", "6390"),
            ("HUB_CACHE_REDIS_PASSWORD", "pw"),
        ]))
        .unwrap();

        let strategy = config.strategy.unwrap();
        assert_eq!(strategy.kind, StrategyKind::RemoteOnly);
        assert_eq!(strategy.remote_ttl, Duration::from_secs(120));
        assert_eq!(strategy.local_ttl, CacheStrategy::default().local_ttl);
        assert!(!strategy.fallback_on_remote_failure);
        assert_eq!(config.local.max_size, 500);
        assert_eq!(config.local.sweep_interval, Duration::from_secs(15));

        let remote = config.remote.unwrap();
        assert_eq!(remote.host, "redis.local");
        assert_eq!(remote.port, 6390);
        assert_eq!(remote.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = CacheConfig::from_lookup(lookup(&[("HUB_CACHE_MAX_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("HUB_CACHE_MAX_SIZE"));

        let err = CacheConfig::from_lookup(lookup(&[("HUB_CACHE_MAX_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));

        assert!(CacheConfig::from_lookup(lookup(&[("HUB_CACHE_STRATEGY", "write-back")])).is_err());
    }

    #[test]
    fn test_builder_and_presets() {
        let config = CacheConfig::builder()
            .strategy(CacheStrategy::layered().local_ttl(Duration::from_secs(30)))
            .remote(RemoteConfig::default())
            .build();
        assert_eq!(config.resolved_strategy().local_ttl, Duration::from_secs(30));
        assert!(config.remote.is_some());
        assert_eq!(config.local, LocalCacheConfig::default());

        assert_eq!(
            CacheConfig::local_only().resolved_strategy().kind,
            StrategyKind::LocalOnly
        );
        assert_eq!(CacheConfig::small().local.max_size, 1_000);
    }

    #[test]
    fn test_serde_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"strategy": {"kind": "local-only"}}"#).unwrap();
        let strategy = config.resolved_strategy();
        assert_eq!(strategy.kind, StrategyKind::LocalOnly);
        assert_eq!(strategy.local_ttl, CacheStrategy::default().local_ttl);
        assert_eq!(config.local.max_size, 10_000);
    }
}
