//! Integration Tests for Cache Behaviour
//!
//! Exercises the cache core against the bundled backends and against test
//! backends that keep no recency order or fail on demand.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use expiring_lru::cache::{CacheEntry, Clock, ManualClock};
use expiring_lru::config::SyncMode;
use expiring_lru::tasks::SweepReport;
use expiring_lru::{Cache, CacheConfig, CacheError, FileStore, Lookup, MemoryStore, Result, Storage};
use tokio::sync::Mutex;

// == Test Backends ==

/// Hash map backend with no recency order and no key enumeration.
#[derive(Debug)]
struct OpaqueStore {
    entries: Mutex<HashMap<u32, CacheEntry<String>>>,
    clock: ManualClock,
}

impl OpaqueStore {
    fn new(clock: ManualClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl Storage<u32, String> for OpaqueStore {
    async fn get(&self, key: &u32) -> Result<Lookup<String>> {
        let now = self.clock.now_ms();
        let entries = self.entries.lock().await;
        Ok(match entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => Lookup::Hit(entry.value.clone()),
            _ => Lookup::Miss,
        })
    }

    async fn put(&self, key: u32, value: String, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl, self.clock.now_ms());
        self.entries.lock().await.insert(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &u32) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }

    async fn remove_if_expired(&self, key: &u32) -> Result<bool> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

/// Memory backend that fails reads on demand and never removes poisoned keys.
struct FailingStore {
    inner: MemoryStore<u32, String>,
    fail_reads: AtomicBool,
    poisoned: HashSet<u32>,
}

impl FailingStore {
    fn new(clock: ManualClock, poisoned: impl IntoIterator<Item = u32>) -> Self {
        Self {
            inner: MemoryStore::with_clock(Arc::new(clock)),
            fail_reads: AtomicBool::new(false),
            poisoned: poisoned.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Storage<u32, String> for FailingStore {
    async fn get(&self, key: &u32) -> Result<Lookup<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Storage("backend unreachable".to_string()));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: u32, value: String, ttl: Duration) -> Result<()> {
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &u32) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn stop(&self) -> Result<()> {
        self.inner.stop().await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }

    async fn remove_if_expired(&self, key: &u32) -> Result<bool> {
        if self.poisoned.contains(key) {
            return Err(CacheError::Storage(format!("cannot remove {key}")));
        }
        self.inner.remove_if_expired(key).await
    }

    async fn keys(&self) -> Result<Option<Vec<u32>>> {
        self.inner.keys().await
    }

    fn tracks_recency(&self) -> bool {
        self.inner.tracks_recency()
    }

    async fn least_recently_used(&self) -> Result<Option<u32>> {
        self.inner.least_recently_used().await
    }
}

// == Helper Functions ==

fn config(capacity: usize, ttl_ms: u64) -> CacheConfig {
    CacheConfig::from_millis(capacity, ttl_ms, 100).unwrap()
}

fn memory_cache(capacity: usize, ttl_ms: u64, clock: &ManualClock) -> Cache<u32, String> {
    Cache::new(
        config(capacity, ttl_ms),
        MemoryStore::with_clock(Arc::new(clock.clone())),
    )
}

fn value(key: u32) -> String {
    format!("v{key}")
}

// == Eviction ==

#[tokio::test]
async fn test_least_recently_used_is_evicted() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(3, 60_000, &clock);

    for key in 1..=3 {
        cache.put(key, value(key)).await.unwrap();
    }
    cache.put(4, value(4)).await.unwrap();

    assert!(cache.get(&1).await.unwrap().is_miss());
    for key in 2..=4 {
        assert_eq!(cache.get(&key).await.unwrap(), Lookup::Hit(value(key)));
    }
}

#[tokio::test]
async fn test_read_protects_from_eviction() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(3, 60_000, &clock);

    for key in 1..=3 {
        cache.put(key, value(key)).await.unwrap();
    }
    cache.get(&1).await.unwrap();
    cache.put(4, value(4)).await.unwrap();

    assert!(cache.get(&2).await.unwrap().is_miss());
    assert!(cache.get(&1).await.unwrap().is_hit());
}

#[tokio::test]
async fn test_overwrite_refreshes_recency() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(2, 60_000, &clock);

    cache.put(1, value(1)).await.unwrap();
    cache.put(2, value(2)).await.unwrap();
    cache.put(1, "again".to_string()).await.unwrap();
    cache.put(3, value(3)).await.unwrap();

    assert!(cache.get(&2).await.unwrap().is_miss());
    assert_eq!(cache.get(&1).await.unwrap(), Lookup::Hit("again".to_string()));
}

#[tokio::test]
async fn test_capacity_one_keeps_latest() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(1, 60_000, &clock);

    cache.put(1, value(1)).await.unwrap();
    cache.put(2, value(2)).await.unwrap();

    assert_eq!(cache.len().await.unwrap(), 1);
    assert!(cache.get(&2).await.unwrap().is_hit());
    assert_eq!(cache.stats().await.evictions, 1);
}

#[tokio::test]
async fn test_core_tracks_recency_for_opaque_backend() {
    let clock = ManualClock::new(0);
    let cache = Cache::new(config(3, 60_000), OpaqueStore::new(clock.clone()));

    for key in 1..=3 {
        cache.put(key, value(key)).await.unwrap();
    }
    cache.get(&1).await.unwrap();
    cache.put(4, value(4)).await.unwrap();

    assert_eq!(cache.len().await.unwrap(), 3);
    assert!(cache.get(&2).await.unwrap().is_miss());
    for key in [1, 3, 4] {
        assert!(cache.get(&key).await.unwrap().is_hit(), "key {key} should remain");
    }
}

// == Expiry ==

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(10, 5000, &clock);

    cache.put(1, "A".to_string()).await.unwrap();

    clock.set(4999);
    assert!(cache.get(&1).await.unwrap().is_hit());
    clock.set(6000);
    assert!(cache.get(&1).await.unwrap().is_miss());
}

#[tokio::test]
async fn test_reads_do_not_extend_ttl() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(10, 5000, &clock);

    cache.put(1, "A".to_string()).await.unwrap();

    clock.set(2000);
    assert!(cache.get(&1).await.unwrap().is_hit());
    clock.set(5500);
    assert!(cache.get(&1).await.unwrap().is_miss());
}

#[tokio::test]
async fn test_overwrite_restarts_ttl() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(10, 5000, &clock);

    cache.put(1, "A".to_string()).await.unwrap();
    clock.set(4000);
    cache.put(1, "B".to_string()).await.unwrap();
    clock.set(8000);

    assert_eq!(cache.get(&1).await.unwrap(), Lookup::Hit("B".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_sweep_purges_within_one_interval() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(10, 5000, &clock);

    cache.put(1, "A".to_string()).await.unwrap();
    cache.put(2, "B".to_string()).await.unwrap();
    clock.set(6000);

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.len().await.unwrap(), 0);
    assert_eq!(cache.stats().await.expirations, 2);
    cache.stop().await.unwrap();
}

#[tokio::test]
async fn test_sweep_uses_core_keys_for_opaque_backend() {
    let clock = ManualClock::new(0);
    let cache = Cache::new(config(10, 5000), OpaqueStore::new(clock.clone()));

    cache.put(1, "A".to_string()).await.unwrap();
    clock.set(3000);
    cache.put(2, "B".to_string()).await.unwrap();
    clock.set(6000);

    let report = cache.purge_expired().await;

    assert_eq!(report, SweepReport { scanned: 2, expired: 1, failed: 0 });
    assert_eq!(cache.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_missed_expired_entry_does_not_displace_new_writes() {
    let clock = ManualClock::new(0);
    let store = Arc::new(OpaqueStore::new(clock.clone()));
    let cache: Cache<u32, String> = Cache::with_shared_storage(config(1, 5000), store.clone());

    cache.put(1, "A".to_string()).await.unwrap();
    clock.set(6000);

    // The backend keeps expired entries until told to remove them
    assert!(cache.get(&1).await.unwrap().is_miss());
    assert_eq!(store.len().await.unwrap(), 0);

    cache.put(2, "B".to_string()).await.unwrap();
    assert_eq!(cache.get(&2).await.unwrap(), Lookup::Hit("B".to_string()));
    assert_eq!(cache.len().await.unwrap(), 1);
    assert_eq!(cache.stats().await.evictions, 0);
}

// == Failure Handling ==

#[tokio::test]
async fn test_backend_failure_is_not_a_miss() {
    let clock = ManualClock::new(0);
    let store = Arc::new(FailingStore::new(clock, []));
    let cache: Cache<u32, String> = Cache::with_shared_storage(config(10, 5000), store.clone());

    cache.put(1, "A".to_string()).await.unwrap();
    store.fail_reads.store(true, Ordering::SeqCst);

    let err = cache.get(&1).await.unwrap_err();
    assert!(err.is_backend_failure());
    assert_eq!(cache.stats().await.misses, 0);

    store.fail_reads.store(false, Ordering::SeqCst);
    assert!(cache.get(&1).await.unwrap().is_hit());
}

#[tokio::test]
async fn test_sweep_continues_past_failed_keys() {
    let clock = ManualClock::new(0);
    let cache = Cache::new(config(10, 1000), FailingStore::new(clock.clone(), [2]));

    for key in 1..=3 {
        cache.put(key, value(key)).await.unwrap();
    }
    clock.set(2000);

    let report = cache.purge_expired().await;

    assert_eq!(report, SweepReport { scanned: 3, expired: 2, failed: 1 });
    assert_eq!(cache.len().await.unwrap(), 1);
    assert_eq!(cache.stats().await.sweep_failures, 1);
    // Still expired, so still invisible
    assert!(cache.get(&2).await.unwrap().is_miss());
}

// == Lifecycle ==

#[tokio::test]
async fn test_stop_is_idempotent() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(10, 5000, &clock);

    cache.stop().await.unwrap();
    cache.stop().await.unwrap();

    assert!(matches!(cache.get(&1).await, Err(CacheError::Stopped)));
}

#[tokio::test(start_paused = true)]
async fn test_no_sweeps_after_stop() {
    let clock = ManualClock::new(0);
    let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
    let cache: Cache<u32, String> = Cache::with_shared_storage(config(10, 5000), store.clone());

    cache.put(1, "A".to_string()).await.unwrap();
    cache.stop().await.unwrap();
    clock.set(6000);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(cache.stats().await.expirations, 0);
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_read_their_own_writes() {
    let cache: Cache<u32, String> = Cache::new(
        CacheConfig::new(1000, Duration::from_secs(60)).unwrap(),
        MemoryStore::new(),
    );

    let mut handles = Vec::new();
    for task in 0..16u32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50u32 {
                let key = task * 1000 + i;
                cache.put(key, value(key)).await.unwrap();
                assert_eq!(cache.get(&key).await.unwrap(), Lookup::Hit(value(key)));
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.len().await.unwrap(), 800);
    cache.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_respect_capacity() {
    let cache: Cache<u32, String> = Cache::new(
        CacheConfig::new(10, Duration::from_secs(60)).unwrap(),
        MemoryStore::new(),
    );

    let mut handles = Vec::new();
    for task in 0..8u32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..100u32 {
                cache.put(task * 1000 + i, value(i)).await.unwrap();
                assert!(cache.len().await.unwrap() <= 10);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.len().await.unwrap(), 10);
    assert_eq!(cache.stats().await.evictions, 790);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweep_never_removes_a_fresh_rewrite() {
    let clock = ManualClock::new(0);
    let cache = memory_cache(10, 1000, &clock);
    let done = Arc::new(AtomicBool::new(false));

    let sweeper = {
        let cache = cache.clone();
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut expired = 0;
            while !done.load(Ordering::SeqCst) {
                expired += cache.purge_expired().await.expired;
                tokio::task::yield_now().await;
            }
            expired
        })
    };

    // Only this task moves the clock, so each rewrite is live until the next
    // iteration expires it and the sweeper races to remove it
    for i in 0..500u32 {
        clock.advance(Duration::from_millis(1500));
        cache.put(7, value(i)).await.unwrap();
        assert_eq!(cache.get(&7).await.unwrap(), Lookup::Hit(value(i)), "iteration {i}");
        tokio::task::yield_now().await;
    }

    done.store(true, Ordering::SeqCst);
    let expired = sweeper.await.unwrap();
    assert!(expired <= 500);
    cache.stop().await.unwrap();
}

// == Persistence ==

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let clock = ManualClock::new(0);

    let store = FileStore::open_with_clock(&path, SyncMode::OnStop, Arc::new(clock.clone())).await;
    let cache: Cache<u32, String> = Cache::new(config(2, 5000), store);
    cache.put(1, value(1)).await.unwrap();
    cache.put(2, value(2)).await.unwrap();
    cache.get(&1).await.unwrap();
    cache.stop().await.unwrap();

    let store = FileStore::open_with_clock(&path, SyncMode::OnStop, Arc::new(clock.clone())).await;
    let cache: Cache<u32, String> = Cache::new(config(2, 5000), store);

    // 2 was least recently used before the restart
    cache.put(3, value(3)).await.unwrap();
    assert!(cache.get(&2).await.unwrap().is_miss());
    assert_eq!(cache.get(&1).await.unwrap(), Lookup::Hit(value(1)));

    // Expiry times survive the restart too
    clock.set(5000);
    assert!(cache.get(&1).await.unwrap().is_miss());
    assert!(cache.get(&3).await.unwrap().is_miss());
    cache.stop().await.unwrap();
}
