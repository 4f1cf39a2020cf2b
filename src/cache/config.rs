//! Configuration for the in-process tier

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the in-process (L1) cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalCacheConfig {
    /// Maximum number of entries; the tier never holds more after a `set`
    pub max_size: usize,

    /// Interval between background sweeps of expired entries
    pub sweep_interval: Duration,

    /// Capacity of the queue that hands expired keys seen by `get`
    /// to the background task
    pub reap_queue_capacity: usize,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            // Sweep every minute
            sweep_interval: Duration::from_secs(60),
            reap_queue_capacity: 1024,
        }
    }
}

impl LocalCacheConfig {
    /// Create a new builder for local cache configuration
    pub fn builder() -> LocalCacheConfigBuilder {
        LocalCacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::Config(
                "local max_size must be greater than 0".to_string(),
            ));
        }

        if self.sweep_interval.is_zero() {
            return Err(CacheError::Config(
                "local sweep_interval must be greater than 0".to_string(),
            ));
        }

        if self.reap_queue_capacity == 0 {
            return Err(CacheError::Config(
                "local reap_queue_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration for memory-constrained environments
    pub fn small() -> Self {
        Self {
            max_size: 1_000,
            sweep_interval: Duration::from_secs(30),
            reap_queue_capacity: 256,
        }
    }
}

/// Builder for local cache configuration
#[derive(Debug, Default)]
pub struct LocalCacheConfigBuilder {
    max_size: Option<usize>,
    sweep_interval: Option<Duration>,
    reap_queue_capacity: Option<usize>,
}

impl LocalCacheConfigBuilder {
    /// Set the capacity bound
    pub fn max_size(mut self, max: usize) -> Self {
        self.max_size = Some(max);
        self
    }

    /// Set the sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Set the lazy-deletion queue capacity
    pub fn reap_queue_capacity(mut self, capacity: usize) -> Self {
        self.reap_queue_capacity = Some(capacity);
        self
    }

    /// Build the configuration
    pub fn build(self) -> LocalCacheConfig {
        let defaults = LocalCacheConfig::default();

        LocalCacheConfig {
            max_size: self.max_size.unwrap_or(defaults.max_size),
            sweep_interval: self.sweep_interval.unwrap_or(defaults.sweep_interval),
            reap_queue_capacity: self
                .reap_queue_capacity
                .unwrap_or(defaults.reap_queue_capacity),
        }
    }
}
