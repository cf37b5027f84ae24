/// In-memory cache store with lazy expiry
use crate::cache::{CacheStore, CacheValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Upper bound for TTLs too large to add to the clock
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Map size at which a write sweeps out expired entries
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
struct Entries {
    map: HashMap<String, Entry>,
    /// Size at which the next write sweeps expired entries
    sweep_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            sweep_at: SWEEP_THRESHOLD,
        }
    }
}

impl Entries {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_live(now));
        self.sweep_at = (self.map.len() * 2).max(SWEEP_THRESHOLD);
        before - self.map.len()
    }
}

/// Process-local cache store
///
/// Expired entries are dropped when a read finds them and swept in bulk
/// whenever a write grows the map past a threshold.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<Entries>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.map.is_empty()
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.entries.write().await.sweep(Instant::now())
    }

    /// Remove `key` if it is still expired once the write lock is held
    async fn evict(&self, key: &str, now: Instant) {
        let mut entries = self.entries.write().await;
        if entries.map.get(key).is_some_and(|entry| !entry.is_live(now)) {
            debug!("Cache EXPIRED: {}", key);
            entries.map.remove(key);
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn get(&self, key: &str) -> Option<CacheValue> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.map.get(key) {
                Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.evict(key, now).await;
        None
    }

    async fn put(&self, key: &str, value: CacheValue, ttl_secs: u64) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_secs))
            .unwrap_or_else(|| now + MAX_TTL);
        debug!("Cache SET: {} (TTL: {}s)", key, ttl_secs);

        let mut entries = self.entries.write().await;
        entries.map.insert(key.to_string(), Entry { value, expires_at });
        if entries.map.len() >= entries.sweep_at {
            let removed = entries.sweep(now);
            debug!("Cache SWEEP: {} expired entries removed", removed);
        }
    }

    async fn forget(&self, key: &str) {
        debug!("Cache DELETE: {}", key);
        self.entries.write().await.map.remove(key);
    }

    async fn flush(&self) {
        debug!("Cache FLUSH");
        let mut entries = self.entries.write().await;
        entries.map.clear();
        entries.sweep_at = SWEEP_THRESHOLD;
    }
}
