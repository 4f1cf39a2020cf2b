//! Health reporting for the cache tiers
//!
//! Health is reported independently of serving: a degraded manager keeps
//! answering requests from whichever tiers still work.

use crate::cache::StrategyKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every configured tier is reachable
    Healthy,
    /// Serving, but a configured tier is unreachable or slow
    Degraded,
    /// The tier the strategy depends on is unreachable
    Unhealthy,
}

impl HealthStatus {
    /// Convert to HTTP status code equivalent
    pub fn to_http_status_code(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Degraded => 200,
            HealthStatus::Unhealthy => 503,
        }
    }

    /// Check if status is healthy or degraded (operational)
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    /// The worse of two statuses
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        use HealthStatus::*;
        match (self, other) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Degraded, _) | (_, Degraded) => Degraded,
            _ => Healthy,
        }
    }
}

/// Health of a single tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierHealth {
    pub status: HealthStatus,
    /// Probe round-trip, when a probe was made
    pub response_time_ms: Option<u64>,
    /// Error message (if not healthy)
    pub error: Option<String>,
}

impl TierHealth {
    pub fn healthy(response_time: Option<Duration>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            response_time_ms: response_time.map(|d| d.as_millis() as u64),
            error: None,
        }
    }

    pub fn failed(status: HealthStatus, response_time: Option<Duration>, error: &str) -> Self {
        Self {
            status,
            response_time_ms: response_time.map(|d| d.as_millis() as u64),
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate health of a cache manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall health status
    pub status: HealthStatus,
    /// Strategy as configured
    pub configured_mode: StrategyKind,
    /// Strategy actually running (differs after a startup fallback)
    pub effective_mode: StrategyKind,
    pub local: TierHealth,
    /// `None` when no remote tier is configured
    pub remote: Option<TierHealth>,
    /// Timestamp of the check
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Whether requests are still being answered
    pub fn is_serving(&self) -> bool {
        self.local.status.is_operational()
            || self
                .remote
                .as_ref()
                .map(|r| r.status.is_operational())
                .unwrap_or(false)
    }
}
