//! Layered Cache Demo Application
//!
//! Demonstrates the cache manager, its startup fallback and health report.
//!
//! Usage:
//!   cargo run --example layered_demo
//!
//! Environment variables (all optional, `.env` is read too):
//!   HUB_CACHE_STRATEGY    - layered, remote-only or local-only (default: layered)
//!   HUB_CACHE_REDIS_HOST  - Redis host; without it the demo runs local-only
//!   HUB_CACHE_REDIS_PORT  - Redis port (default: 6379)
//!   RUST_LOG              - log filter (default: hub_cache=info)

use hub_cache::{CacheConfig, CacheManager};
use serde_json::json;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "hub_cache=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Layered Cache Demo ===");

    let config = CacheConfig::from_env()?;
    let cache: CacheManager = CacheManager::new(config).await?;
    cache.start().await;

    info!(
        "Configured: {}, running: {}",
        cache.strategy().kind,
        cache.mode()
    );

    info!("\n--- Write and read ---");
    cache
        .set("user:42", json!({ "name": "Ada", "roles": ["admin"] }), Duration::ZERO)
        .await?;
    let user = cache.get("user:42").await?;
    info!("user:42 -> {}", user);

    match cache.get("user:43").await {
        Ok(value) => info!("user:43 -> {}", value),
        Err(e) if e.is_miss() => info!("user:43 is not cached"),
        Err(e) => return Err(e.into()),
    }

    cache.delete("user:42").await?;
    info!(
        "user:42 after delete: {}",
        if cache.get("user:42").await.is_ok() { "still cached" } else { "gone" }
    );

    info!("\n--- Short TTL ---");
    cache
        .set("session:1", json!("token"), Duration::from_millis(200))
        .await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    info!(
        "session:1 after 300ms: {}",
        if cache.get("session:1").await.is_ok() { "still cached" } else { "expired" }
    );

    info!("\n--- Health ---");
    let health = cache.health().await;
    info!("Status: {:?} (HTTP {})", health.status, health.status.to_http_status_code());
    info!("Local: {:?}", health.local.status);
    match &health.remote {
        Some(remote) => {
            info!("Remote: {:?}", remote.status);
            if let Some(error) = &remote.error {
                info!("Remote error: {}", error);
            }
        }
        None => info!("Remote: not in use"),
    }

    info!("\n--- Metrics ---");
    let metrics = cache.metrics().await;
    info!("{}", metrics.local);
    info!(
        "local hits: {}, remote hits: {}, misses: {}, remote errors: {}, hit rate: {:.1}%",
        metrics.local_hits,
        metrics.remote_hits,
        metrics.misses,
        metrics.remote_errors,
        metrics.hit_rate()
    );

    info!("Health JSON:\n{}", serde_json::to_string_pretty(&health)?);
    info!("Metrics JSON:\n{}", serde_json::to_string_pretty(&metrics)?);

    cache.stop().await;
    info!("\n=== Demo Complete ===");

    Ok(())
}
