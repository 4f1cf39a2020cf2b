//! Cache item with TTL and access bookkeeping

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// A value stored in the in-process tier
///
/// The value and expiry are fixed at insertion. Access bookkeeping lives in
/// atomics so that a hit only needs the map's read lock.
#[derive(Debug)]
pub struct CacheItem<V> {
    /// The cached value
    value: V,

    /// When the item expires
    expires_at: DateTime<Utc>,

    /// Number of successful reads, starting at 1 on insertion
    access_count: AtomicU64,

    /// Last access stamp in nanoseconds since the Unix epoch (for LRU tracking)
    last_access: AtomicI64,
}

impl<V> CacheItem<V> {
    /// Create a new item expiring `ttl` after `now`
    ///
    /// `stamp` is the initial last-access stamp, see [`LruClock`].
    pub fn new(value: V, ttl: Duration, now: DateTime<Utc>, stamp: i64) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            expires_at,
            access_count: AtomicU64::new(1),
            last_access: AtomicI64::new(stamp),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the item is dead at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check if the item has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now();
        if now > self.expires_at {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }

    /// Record a successful read
    pub fn mark_accessed(&self, stamp: i64) {
        self.access_count.fetch_add(1, Ordering::Relaxed);
        self.last_access.fetch_max(stamp, Ordering::Relaxed);
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// Raw last-access stamp used for eviction ordering
    pub fn last_access_stamp(&self) -> i64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Last access time
    pub fn last_access(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.last_access_stamp())
    }

    #[cfg(test)]
    pub(crate) fn set_last_access_stamp(&self, stamp: i64) {
        self.last_access.store(stamp, Ordering::Relaxed);
    }
}

/// Strictly increasing access clock
///
/// Stamps follow wall-clock nanoseconds but never repeat, so two accesses
/// can only tie if a stamp is written by hand.
#[derive(Debug, Default)]
pub struct LruClock {
    last: AtomicI64,
}

impl LruClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next stamp for `now`
    pub fn stamp(&self, now: DateTime<Utc>) -> i64 {
        let wall = now.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}
