//! In-Memory Store
//!
//! Reference backend: entries kept in access order in an unbounded `LruCache`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::cache::{CacheEntry, Clock, Lookup, SystemClock};
use crate::error::Result;
use crate::storage::{CacheKey, CacheValue, Storage};

struct MemoryInner<K: CacheKey, V> {
    /// Entries, most recently used at the front
    entries: LruCache<K, CacheEntry<V>>,
    /// Set once `stop` has discarded the entries
    released: bool,
}

// == Memory Store ==
/// Volatile backend that tracks recency itself.
///
/// Capacity is not enforced here; the cache core decides what to evict.
pub struct MemoryStore<K: CacheKey, V: CacheValue> {
    inner: Mutex<MemoryInner<K, V>>,
    clock: Arc<dyn Clock>,
}

impl<K: CacheKey, V: CacheValue> MemoryStore<K, V> {
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store that stamps expiry with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                entries: LruCache::unbounded(),
                released: false,
            }),
            clock,
        }
    }

    /// Copies every entry, least recently used first. Expired entries are included.
    pub async fn snapshot(&self) -> Vec<(K, CacheEntry<V>)> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .iter()
            .rev()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Loads entries given least recently used first, keeping their expiry.
    pub async fn restore(&self, entries: Vec<(K, CacheEntry<V>)>) {
        let mut inner = self.inner.lock().await;
        for (key, entry) in entries {
            inner.entries.put(key, entry);
        }
    }
}

impl<K: CacheKey, V: CacheValue> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Storage<K, V> for MemoryStore<K, V> {
    async fn get(&self, key: &K) -> Result<Lookup<V>> {
        let mut inner = self.inner.lock().await;
        let now = self.clock.now_ms();

        let expired = match inner.entries.peek(key) {
            Some(entry) => entry.is_expired_at(now),
            None => return Ok(Lookup::Miss),
        };

        if expired {
            inner.entries.pop(key);
            debug!(?key, "Removed expired entry on access");
            return Ok(Lookup::Miss);
        }

        // `get` promotes the entry to most recently used
        Ok(inner.entries.get(key).map(|entry| entry.value.clone()).into())
    }

    async fn put(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let entry = CacheEntry::new(value, ttl, self.clock.now_ms());
        trace!(?key, expires_at = entry.expires_at, "Storing entry");
        inner.entries.put(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.entries.pop(key);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.released {
            return Ok(());
        }

        let discarded = inner.entries.len();
        inner.entries.clear();
        inner.released = true;
        debug!(discarded, "Memory store released");
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.lock().await.entries.len())
    }

    async fn remove_if_expired(&self, key: &K) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let now = self.clock.now_ms();

        let expired = inner
            .entries
            .peek(key)
            .is_some_and(|entry| entry.is_expired_at(now));

        if expired {
            inner.entries.pop(key);
        }
        Ok(expired)
    }

    async fn keys(&self) -> Result<Option<Vec<K>>> {
        let inner = self.inner.lock().await;
        Ok(Some(inner.entries.iter().rev().map(|(key, _)| key.clone()).collect()))
    }

    fn tracks_recency(&self) -> bool {
        true
    }

    async fn least_recently_used(&self) -> Result<Option<K>> {
        let inner = self.inner.lock().await;
        Ok(inner.entries.peek_lru().map(|(key, _)| key.clone()))
    }
}
