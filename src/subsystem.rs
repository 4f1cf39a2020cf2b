//! Uniform lifecycle for hub subsystems
//!
//! The hub starts, stops and monitors its subsystems (cache, database,
//! search, ...) through this trait without knowing their concrete types.

use crate::error::Result;
use crate::health::HealthStatus;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Subsystem: Send + Sync {
    /// Stable name used in logs and metric labels
    fn name(&self) -> &str;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn health(&self) -> HealthStatus;

    /// Metrics snapshot for operational reporting
    async fn metrics(&self) -> serde_json::Value;
}

/// Worst health across `subsystems`; healthy when there are none
pub async fn overall_health(subsystems: &[Arc<dyn Subsystem>]) -> HealthStatus {
    let mut status = HealthStatus::Healthy;
    for subsystem in subsystems {
        status = status.worst(subsystem.health().await);
    }
    status
}
