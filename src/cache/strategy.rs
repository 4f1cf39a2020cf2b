//! Caching strategy selection and TTL resolution

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Which tiers a manager consults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Read-through/write-through over local and remote tiers
    #[default]
    Layered,

    /// Remote tier only; the local tier is never consulted
    RemoteOnly,

    /// Local tier only; the remote tier is never consulted
    LocalOnly,
}

impl StrategyKind {
    pub fn uses_local(&self) -> bool {
        matches!(self, StrategyKind::Layered | StrategyKind::LocalOnly)
    }

    pub fn uses_remote(&self) -> bool {
        matches!(self, StrategyKind::Layered | StrategyKind::RemoteOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Layered => "layered",
            StrategyKind::RemoteOnly => "remote-only",
            StrategyKind::LocalOnly => "local-only",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "layered" => Ok(StrategyKind::Layered),
            "remote-only" => Ok(StrategyKind::RemoteOnly),
            "local-only" => Ok(StrategyKind::LocalOnly),
            other => Err(CacheError::Config(format!(
                "unknown cache strategy '{}' (expected layered, remote-only or local-only)",
                other
            ))),
        }
    }
}

/// Strategy configuration: kind, per-tier default TTLs and startup fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheStrategy {
    pub kind: StrategyKind,

    /// Default lifetime of local entries
    pub local_ttl: Duration,

    /// Default lifetime of remote entries
    pub remote_ttl: Duration,

    /// Continue local-only when the remote tier is unreachable at startup
    pub fallback_on_remote_failure: bool,
}

impl Default for CacheStrategy {
    fn default() -> Self {
        Self {
            kind: StrategyKind::Layered,
            // Local entries go stale sooner than the shared tier
            local_ttl: Duration::from_secs(300),
            remote_ttl: Duration::from_secs(3600),
            fallback_on_remote_failure: true,
        }
    }
}

impl CacheStrategy {
    /// Default TTLs with the given kind
    pub fn with_kind(kind: StrategyKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn layered() -> Self {
        Self::with_kind(StrategyKind::Layered)
    }

    pub fn remote_only() -> Self {
        Self::with_kind(StrategyKind::RemoteOnly)
    }

    pub fn local_only() -> Self {
        Self::with_kind(StrategyKind::LocalOnly)
    }

    pub fn local_ttl(mut self, ttl: Duration) -> Self {
        self.local_ttl = ttl;
        self
    }

    pub fn remote_ttl(mut self, ttl: Duration) -> Self {
        self.remote_ttl = ttl;
        self
    }

    pub fn fallback_on_remote_failure(mut self, enable: bool) -> Self {
        self.fallback_on_remote_failure = enable;
        self
    }

    /// Validate the strategy
    pub fn validate(&self) -> Result<()> {
        if self.local_ttl.is_zero() {
            return Err(CacheError::Config("local_ttl must be greater than 0".to_string()));
        }

        if self.remote_ttl.is_zero() {
            return Err(CacheError::Config("remote_ttl must be greater than 0".to_string()));
        }

        if self.kind == StrategyKind::Layered && self.local_ttl > self.remote_ttl {
            warn!(
                "Layered strategy with local_ttl ({:?}) longer than remote_ttl ({:?})",
                self.local_ttl, self.remote_ttl
            );
        }

        Ok(())
    }

    /// Local TTL for a write in `mode`; a zero override means "use the default"
    ///
    /// `mode` is the mode actually running, which differs from `kind` after
    /// a startup fallback. In layered mode an override can only shorten the
    /// local lifetime.
    pub fn resolve_local_ttl(&self, mode: StrategyKind, ttl_override: Duration) -> Duration {
        if ttl_override.is_zero() {
            return self.local_ttl;
        }

        match mode {
            StrategyKind::Layered => ttl_override.min(self.local_ttl),
            _ => ttl_override,
        }
    }

    /// Remote TTL for a write; a zero override means "use the default"
    pub fn resolve_remote_ttl(&self, ttl_override: Duration) -> Duration {
        if ttl_override.is_zero() {
            self.remote_ttl
        } else {
            ttl_override
        }
    }

    /// TTL used when a remote hit is promoted into the local tier
    ///
    /// This is the configured local TTL, not the remote entry's remaining
    /// lifetime, so a promoted entry may outlive its remote copy by up to
    /// `local_ttl`.
    pub fn promotion_ttl(&self) -> Duration {
        self.local_ttl
    }
}
