//! In-process cache tier with TTL expiry, LRU eviction and background sweeping

use crate::cache::{
    config::LocalCacheConfig,
    entry::{CacheItem, LruClock},
    types::{CacheKey, CacheStats, StatCounters},
};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// In-process (L1) cache
///
/// This implementation provides:
/// - Concurrent reads under a shared `RwLock`; writes are exclusive
/// - TTL expiry checked on every read, whether or not a sweep has run
/// - Exact LRU eviction when a new key arrives at capacity
/// - A background task that sweeps expired entries and performs the
///   deletions scheduled by reads of expired keys
///
/// Eviction scans every entry for the smallest last-access stamp. Ties are
/// broken by the lexicographically smallest key.
pub struct InProcessCache<V> {
    config: LocalCacheConfig,

    /// State shared with the background task
    shared: Arc<Shared<V>>,

    /// Background task lifecycle
    sweeper: Mutex<SweeperState>,
}

/// Internal cache storage
struct Shared<V> {
    /// Main storage: key -> item
    items: RwLock<HashMap<CacheKey, CacheItem<V>>>,

    max_size: usize,

    clock: LruClock,

    counters: StatCounters,

    /// Expired keys observed by `get`, drained by the background task
    reap_tx: mpsc::Sender<CacheKey>,

    /// Whether the background task is currently draining `reap_tx`
    sweeping: AtomicBool,
}

enum SweeperState {
    /// Not running; holds the reap queue receiver for the next start
    Idle(mpsc::Receiver<CacheKey>),

    Running {
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<mpsc::Receiver<CacheKey>>,
    },

    /// The task ended abnormally and its receiver is lost
    Failed,
}

impl<V> Shared<V> {
    fn remove_if_expired(
        &self,
        items: &mut HashMap<CacheKey, CacheItem<V>>,
        key: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let expired = items
            .get(key)
            .map(|item| item.is_expired_at(now))
            .unwrap_or(false);

        if expired {
            items.remove(key);
            StatCounters::incr(&self.counters.expirations);
            debug!("Removed expired cache entry: {}", key);
        }

        expired
    }

    /// Remove a key reported expired by a read
    ///
    /// Expiry is re-checked under the write lock: the key may have been
    /// set again since the read saw it.
    async fn reap(&self, key: &str) -> bool {
        let mut items = self.items.write().await;
        self.remove_if_expired(&mut items, key, Utc::now())
    }

    /// Non-blocking variant used when no background task is draining the queue
    fn try_reap_now(&self, key: &str) -> bool {
        match self.items.try_write() {
            Ok(mut items) => self.remove_if_expired(&mut items, key, Utc::now()),
            Err(_) => false,
        }
    }

    /// One reclamation pass: remove every expired entry
    async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut items = self.items.write().await;

        let before = items.len();
        items.retain(|_, item| !item.is_expired_at(now));
        let removed = before - items.len();

        if removed > 0 {
            StatCounters::add(&self.counters.expirations, removed as u64);
        }

        removed
    }
}

impl<V> InProcessCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration
    ///
    /// The background sweep does not run until [`start`](Self::start) is called.
    pub fn new(config: LocalCacheConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing in-process cache (max_size: {}, sweep_interval: {:?})",
            config.max_size, config.sweep_interval
        );

        let (reap_tx, reap_rx) = mpsc::channel(config.reap_queue_capacity);

        let shared = Shared {
            items: RwLock::new(HashMap::new()),
            max_size: config.max_size,
            clock: LruClock::new(),
            counters: StatCounters::default(),
            reap_tx,
            sweeping: AtomicBool::new(false),
        };

        Ok(Self {
            config,
            shared: Arc::new(shared),
            sweeper: Mutex::new(SweeperState::Idle(reap_rx)),
        })
    }

    /// Get a value from the cache
    ///
    /// An expired item reads as a miss and its removal is handed off, so the
    /// caller never waits on the write lock.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();

        {
            let items = self.shared.items.read().await;
            match items.get(key) {
                Some(item) if !item.is_expired_at(now) => {
                    item.mark_accessed(self.shared.clock.stamp(now));
                    StatCounters::incr(&self.shared.counters.hits);
                    debug!("Cache hit: {}", key);
                    return Some(item.value().clone());
                }
                Some(_) => {}
                None => {
                    StatCounters::incr(&self.shared.counters.misses);
                    debug!("Cache miss: {}", key);
                    return None;
                }
            }
        }

        StatCounters::incr(&self.shared.counters.misses);
        debug!("Cache entry expired: {}", key);
        self.schedule_removal(key.to_string());
        None
    }

    /// Insert or overwrite a value
    ///
    /// A new key arriving at capacity evicts exactly one entry first.
    pub async fn set(&self, key: impl Into<CacheKey>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Utc::now();
        let mut items = self.shared.items.write().await;

        if !items.contains_key(&key) && items.len() >= self.shared.max_size {
            if let Some(victim) = Self::lru_victim(&items) {
                debug!("Evicting entry due to max_size limit: {}", victim);
                items.remove(&victim);
                StatCounters::incr(&self.shared.counters.evictions);
            }
        }

        let stamp = self.shared.clock.stamp(now);
        if items.insert(key.clone(), CacheItem::new(value, ttl, now, stamp)).is_some() {
            debug!("Updated existing cache entry: {}", key);
        } else {
            debug!("Inserted new cache entry: {}", key);
        }
    }

    /// Remove a specific entry; absent keys are a no-op
    ///
    /// Returns whether an entry was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut items = self.shared.items.write().await;
        let removed = items.remove(key).is_some();
        if removed {
            debug!("Removed cache entry: {}", key);
        }
        removed
    }

    /// Check if a live entry exists (without updating access bookkeeping)
    pub async fn contains_key(&self, key: &str) -> bool {
        let items = self.shared.items.read().await;
        items
            .get(key)
            .map(|item| !item.is_expired_at(Utc::now()))
            .unwrap_or(false)
    }

    /// Clear all entries from the cache
    pub async fn clear(&self) {
        let mut items = self.shared.items.write().await;
        let count = items.len();
        items.clear();
        info!("Cleared {} entries from cache", count);
    }

    /// Remove all expired entries now, returning how many were removed
    pub async fn cleanup_expired(&self) -> usize {
        let removed = self.shared.sweep().await;
        if removed > 0 {
            debug!("Cleaned up {} expired entries", removed);
        }
        removed
    }

    /// Number of entries, including expired ones not yet reclaimed
    pub async fn len(&self) -> usize {
        self.shared.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.items.read().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.max_size
    }

    pub fn config(&self) -> &LocalCacheConfig {
        &self.config
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.len().await;
        self.shared.counters.snapshot(entries, self.shared.max_size)
    }

    /// Whether the background task is running
    pub fn is_sweeping(&self) -> bool {
        self.shared.sweeping.load(Ordering::Acquire)
    }

    /// Start the background sweep task
    ///
    /// Must be called from within a tokio runtime. Starting a running
    /// cache is a no-op.
    pub async fn start(&self) {
        let mut state = self.sweeper.lock().await;

        let reap_rx = match std::mem::replace(&mut *state, SweeperState::Failed) {
            SweeperState::Idle(reap_rx) => reap_rx,
            SweeperState::Running { shutdown, task } => {
                *state = SweeperState::Running { shutdown, task };
                debug!("Background sweep already running");
                return;
            }
            SweeperState::Failed => {
                warn!("Background sweep cannot be restarted after an abnormal exit");
                return;
            }
        };

        let interval = self.config.sweep_interval;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_sweeper(
            Arc::downgrade(&self.shared),
            reap_rx,
            shutdown_rx,
            interval,
        ));

        self.shared.sweeping.store(true, Ordering::Release);
        *state = SweeperState::Running {
            shutdown: shutdown_tx,
            task,
        };

        info!("Started background cache sweep (interval: {:?})", interval);
    }

    /// Stop the background sweep task
    ///
    /// The cache stays fully usable afterwards; expired entries are then
    /// only reclaimed by reads, eviction, or overwrite.
    pub async fn stop(&self) {
        let mut state = self.sweeper.lock().await;

        match std::mem::replace(&mut *state, SweeperState::Failed) {
            SweeperState::Running { shutdown, task } => {
                self.shared.sweeping.store(false, Ordering::Release);
                let _ = shutdown.send(());

                match task.await {
                    Ok(reap_rx) => *state = SweeperState::Idle(reap_rx),
                    Err(e) => warn!("Background sweep task ended abnormally: {}", e),
                }

                info!("Stopped background cache sweep");
            }
            other => *state = other,
        }
    }

    fn schedule_removal(&self, key: CacheKey) {
        if !self.is_sweeping() {
            self.shared.try_reap_now(&key);
            return;
        }

        match self.shared.reap_tx.try_send(key) {
            Ok(()) => {}
            Err(TrySendError::Full(key)) | Err(TrySendError::Closed(key)) => {
                // Left in place if the lock is busy; the next sweep gets it
                self.shared.try_reap_now(&key);
            }
        }
    }

    fn lru_victim(items: &HashMap<CacheKey, CacheItem<V>>) -> Option<CacheKey> {
        items
            .iter()
            .min_by(|(key_a, a), (key_b, b)| {
                a.last_access_stamp()
                    .cmp(&b.last_access_stamp())
                    .then_with(|| key_a.cmp(key_b))
            })
            .map(|(key, _)| key.clone())
    }
}

impl<V> Drop for InProcessCache<V> {
    fn drop(&mut self) {
        if let SweeperState::Running { task, .. } = self.sweeper.get_mut() {
            task.abort();
        }
    }
}

/// Background task: periodic sweep plus draining of scheduled removals
///
/// Holds only a weak reference so a dropped cache ends the task. Returns
/// the reap receiver so the cache can be started again.
async fn run_sweeper<V>(
    shared: Weak<Shared<V>>,
    mut reap_rx: mpsc::Receiver<CacheKey>,
    mut shutdown: oneshot::Receiver<()>,
    interval: Duration,
) -> mpsc::Receiver<CacheKey>
where
    V: Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let Some(shared) = shared.upgrade() else { break };
                let removed = shared.sweep().await;
                StatCounters::incr(&shared.counters.sweeps);
                if removed > 0 {
                    debug!("Background sweep removed {} expired entries", removed);
                }
            }
            Some(key) = reap_rx.recv() => {
                let Some(shared) = shared.upgrade() else { break };
                shared.reap(&key).await;
            }
        }
    }

    reap_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_size: usize) -> InProcessCache<String> {
        let config = LocalCacheConfig::builder()
            .max_size(max_size)
            .sweep_interval(Duration::from_millis(50))
            .build();
        InProcessCache::new(config).unwrap()
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_basic_set_and_get() {
        let cache = cache(100);

        cache.set("key1", "value1".to_string(), MINUTE).await;

        assert_eq!(cache.get("key1").await, Some("value1".to_string()));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 100);
    }

    #[tokio::test]
    async fn test_cache_miss_has_no_side_effect() {
        let cache = cache(10);

        assert_eq!(cache.get("nonexistent").await, None);
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_access_bookkeeping() {
        let cache = cache(10);
        cache.set("k", "v".to_string(), MINUTE).await;

        let before = {
            let items = cache.shared.items.read().await;
            let item = items.get("k").unwrap();
            assert_eq!(item.access_count(), 1);
            item.last_access_stamp()
        };

        cache.get("k").await;
        cache.get("k").await;

        let items = cache.shared.items.read().await;
        let item = items.get("k").unwrap();
        assert_eq!(item.access_count(), 3);
        assert!(item.last_access_stamp() > before);
    }

    #[tokio::test]
    async fn test_ttl_expiration_without_sweep() {
        let cache = cache(10);

        cache.set("key1", "value1".to_string(), Duration::from_millis(100)).await;
        assert!(cache.get("key1").await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get("key1").await.is_none());
        assert!(!cache.contains_key("key1").await);
    }

    #[tokio::test]
    async fn test_lazy_deletion_when_not_sweeping() {
        let cache = cache(10);

        cache.set("key1", "value1".to_string(), Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get("key1").await.is_none());
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_lazy_deletion_through_background_task() {
        let config = LocalCacheConfig::builder()
            .max_size(10)
            .sweep_interval(Duration::from_secs(3600))
            .build();
        let cache: InProcessCache<String> = InProcessCache::new(config).unwrap();
        cache.start().await;

        cache.set("key1", "value1".to_string(), Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get("key1").await.is_none());

        // The removal is performed by the task, not the read
        for _ in 0..50 {
            if cache.len().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.len().await, 0);

        cache.stop().await;
    }

    #[tokio::test]
    async fn test_reap_keeps_reset_key() {
        let cache = cache(10);

        cache.set("key1", "old".to_string(), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("key1").await.is_none());

        cache.set("key1", "new".to_string(), MINUTE).await;

        // A removal scheduled for the old item must not touch the new one
        assert!(!cache.shared.reap("key1").await);
        assert_eq!(cache.get("key1").await, Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = cache(2);

        cache.set("a", "1".to_string(), MINUTE).await;
        cache.set("b", "2".to_string(), MINUTE).await;
        assert!(cache.get("a").await.is_some());
        cache.set("c", "3".to_string(), MINUTE).await;

        assert!(cache.contains_key("a").await);
        assert!(!cache.contains_key("b").await);
        assert!(cache.contains_key("c").await);
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_eviction_tie_break_is_lexicographic() {
        let cache = cache(3);

        cache.set("m", "1".to_string(), MINUTE).await;
        cache.set("b", "2".to_string(), MINUTE).await;
        cache.set("z", "3".to_string(), MINUTE).await;

        {
            let items = cache.shared.items.read().await;
            for item in items.values() {
                item.set_last_access_stamp(42);
            }
        }

        cache.set("new", "4".to_string(), MINUTE).await;

        assert!(!cache.contains_key("b").await);
        assert!(cache.contains_key("m").await);
        assert!(cache.contains_key("z").await);
        assert!(cache.contains_key("new").await);
    }

    #[tokio::test]
    async fn test_overwrite_needs_no_eviction() {
        let cache = cache(2);

        cache.set("a", "1".to_string(), MINUTE).await;
        cache.set("b", "2".to_string(), MINUTE).await;
        cache.set("a", "updated".to_string(), MINUTE).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.stats().await.evictions, 0);
        assert_eq!(cache.get("a").await, Some("updated".to_string()));
        assert_eq!(cache.get("b").await, Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_overwrite_resets_bookkeeping() {
        let cache = cache(2);

        cache.set("a", "1".to_string(), MINUTE).await;
        cache.get("a").await;
        cache.get("a").await;
        cache.set("a", "2".to_string(), MINUTE).await;

        let items = cache.shared.items.read().await;
        assert_eq!(items.get("a").unwrap().access_count(), 1);
    }

    #[tokio::test]
    async fn test_capacity_invariant() {
        let cache = cache(5);

        for i in 0..50 {
            cache.set(format!("key{}", i % 17), i.to_string(), MINUTE).await;
            assert!(cache.len().await <= 5);
            if i % 3 == 0 {
                cache.get(&format!("key{}", i % 7)).await;
            }
        }
    }

    #[tokio::test]
    async fn test_single_slot_scenario() {
        let cache = cache(1);
        let ttl = Duration::from_secs(10);

        cache.set("k1", "v1".to_string(), ttl).await;
        assert_eq!(cache.get("k1").await, Some("v1".to_string()));

        cache.set("k2", "v2".to_string(), ttl).await;
        assert_eq!(cache.get("k1").await, None);
        assert_eq!(cache.get("k2").await, Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_idempotent_delete() {
        let cache = cache(10);
        cache.set("present", "v".to_string(), MINUTE).await;

        assert!(!cache.delete("missing").await);
        assert_eq!(cache.len().await, 1);

        assert!(cache.delete("present").await);
        assert!(!cache.delete("present").await);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = cache(10);

        cache.set("k1", "v1".to_string(), Duration::from_millis(30)).await;
        cache.set("k2", "v2".to_string(), Duration::from_millis(30)).await;
        cache.set("k3", "v3".to_string(), MINUTE).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.cleanup_expired().await, 2);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.stats().await.expirations, 2);
    }

    #[tokio::test]
    async fn test_background_sweep() {
        let cache = cache(10);
        cache.start().await;
        assert!(cache.is_sweeping());

        cache.set("k1", "v1".to_string(), Duration::from_millis(20)).await;
        cache.set("k2", "v2".to_string(), Duration::from_millis(20)).await;

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Never read, reclaimed by the sweep alone
        assert_eq!(cache.len().await, 0);
        assert!(cache.stats().await.sweeps > 0);

        cache.stop().await;
    }

    #[tokio::test]
    async fn test_stop_then_use() {
        let cache = cache(10);
        cache.start().await;
        cache.stop().await;
        assert!(!cache.is_sweeping());

        cache.set("k1", "v1".to_string(), Duration::from_millis(20)).await;
        assert_eq!(cache.get("k1").await, Some("v1".to_string()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        // No sweep ran, the entry is still stored but reads as a miss
        assert_eq!(cache.stats().await.sweeps, 0);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("k1").await.is_none());

        assert!(!cache.delete("k1").await);
        cache.set("k2", "v2".to_string(), MINUTE).await;
        assert!(cache.contains_key("k2").await);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let cache = cache(10);
        cache.start().await;
        cache.start().await;
        cache.stop().await;
        cache.stop().await;

        cache.start().await;
        assert!(cache.is_sweeping());

        cache.set("k1", "v1".to_string(), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.len().await, 0);

        cache.stop().await;
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache(10);

        cache.set("key1", "value1".to_string(), MINUTE).await;
        cache.set("key2", "value2".to_string(), MINUTE).await;

        cache.clear().await;

        assert_eq!(cache.len().await, 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_access() {
        let cache = Arc::new(cache(16));
        cache.start().await;

        let mut handles = Vec::new();
        for worker in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..200 {
                    let key = format!("key{}", (worker * 7 + i) % 40);
                    match i % 4 {
                        0 => {
                            cache.delete(&key).await;
                        }
                        1 => {
                            cache.get(&key).await;
                        }
                        _ => cache.set(key, i.to_string(), Duration::from_millis(30)).await,
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(cache.len().await <= 16);
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = LocalCacheConfig::builder().max_size(0).build();
        assert!(InProcessCache::<String>::new(config).is_err());
    }
}
