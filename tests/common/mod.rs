//! Shared test fixtures
//!
//! [`FakeRemote`] is an in-memory [`RemoteStore`] whose failures and latency
//! can be switched on per test.

#![allow(dead_code)]

use async_trait::async_trait;
use hub_cache::{CacheError, RemoteStore, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeRemote {
    entries: Mutex<HashMap<String, (Vec<u8>, Duration)>>,
    delay: Mutex<Option<Duration>>,

    pub get_calls: AtomicU64,
    pub set_calls: AtomicU64,
    pub delete_calls: AtomicU64,
    pub ping_calls: AtomicU64,

    pub ping_fails: AtomicBool,
    pub get_fails: AtomicBool,
    pub set_fails: AtomicBool,
    pub delete_fails: AtomicBool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// A remote that refuses every probe
    pub fn unreachable() -> Self {
        let remote = Self::default();
        remote.ping_fails.store(true, Ordering::SeqCst);
        remote
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn insert_json(&self, key: &str, value: &serde_json::Value, ttl: Duration) {
        let bytes = serde_json::to_vec(value).unwrap();
        self.insert_raw(key, bytes, ttl);
    }

    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, ttl));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// TTL the entry was last written with
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn calls(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn fail_if(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(CacheError::RemoteUnavailable(format!("{} refused", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::fail_if(&self.get_fails, "get")?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::fail_if(&self.set_fails, "set")?;
        self.insert_raw(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::fail_if(&self.delete_fails, "delete")?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::fail_if(&self.ping_fails, "ping")
    }
}
