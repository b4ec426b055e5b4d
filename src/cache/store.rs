//! Cache Core
//!
//! The cache core: applies the TTL on write, promotes on read, evicts the
//! least recently used entries after a write overflows capacity, and drives
//! the background expiry sweep.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};

use crate::cache::{CacheStats, Lookup, LruTracker};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::storage::{CacheKey, CacheValue, Storage};
use crate::tasks::{ExpiryScheduler, SweepReport, SweepTarget};

/// State guarded by the operation lock.
struct CoreState<K: CacheKey> {
    /// Recency index for backends that keep none
    recency: Option<LruTracker<K>>,
    stats: CacheStats,
}

struct CacheInner<K: CacheKey, V: CacheValue> {
    config: CacheConfig,
    storage: Arc<dyn Storage<K, V>>,
    /// Serializes every operation, so a put and its evictions commit together
    state: Mutex<CoreState<K>>,
    stopped: AtomicBool,
}

// == Cache ==
/// LRU + TTL cache over a pluggable [`Storage`] backend.
///
/// Handles are cheap to clone and share one cache. Construction spawns the
/// expiry sweep, so it must happen inside a Tokio runtime. Call [`Cache::stop`]
/// during shutdown; the sweep also ends on its own once every handle is dropped.
pub struct Cache<K: CacheKey, V: CacheValue> {
    inner: Arc<CacheInner<K, V>>,
    scheduler: Arc<ExpiryScheduler>,
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> {
    // == Constructor ==
    /// Creates a cache that owns `storage`.
    pub fn new<S: Storage<K, V>>(config: CacheConfig, storage: S) -> Self {
        Self::with_shared_storage(config, Arc::new(storage))
    }

    /// Creates a cache over a backend the caller keeps a handle to.
    pub fn with_shared_storage(config: CacheConfig, storage: Arc<dyn Storage<K, V>>) -> Self {
        let recency = (!storage.tracks_recency()).then(LruTracker::new);

        let inner = Arc::new(CacheInner {
            config,
            storage,
            state: Mutex::new(CoreState {
                recency,
                stats: CacheStats::new(),
            }),
            stopped: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let target: Weak<dyn SweepTarget> = weak;
        let scheduler = ExpiryScheduler::spawn(target, config.expiry_check_interval());

        info!(
            capacity = config.capacity(),
            ttl_ms = config.ttl().as_millis() as u64,
            expiry_check_interval_ms = config.expiry_check_interval().as_millis() as u64,
            "Cache started"
        );

        Self {
            inner,
            scheduler: Arc::new(scheduler),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // == Get ==
    /// Returns the live value for `key`, or [`Lookup::Miss`] if it is absent or expired.
    ///
    /// A hit makes `key` the most recently used entry. Reads never extend the TTL.
    pub async fn get(&self, key: &K) -> Result<Lookup<V>> {
        let mut state = self.lock_running().await?;
        let lookup = self.inner.storage.get(key).await?;

        match &lookup {
            Lookup::Hit(_) => {
                if let Some(recency) = state.recency.as_mut() {
                    recency.touch(key);
                }
                state.stats.record_hit();
                trace!(?key, "Cache hit");
            }
            Lookup::Miss => {
                if state.recency.is_some() {
                    self.inner.forget_missed(&mut state, key).await;
                }
                state.stats.record_miss();
                trace!(?key, "Cache miss");
            }
        }

        Ok(lookup)
    }

    // == Put ==
    /// Stores `value` under `key` with the configured TTL.
    ///
    /// The write is always accepted; if it leaves the backend over capacity,
    /// least recently used entries are evicted before this returns. Capacity
    /// is enforced even when the backend reports the write as failed.
    pub async fn put(&self, key: K, value: V) -> Result<()> {
        let mut state = self.lock_running().await?;
        let written = self
            .inner
            .storage
            .put(key.clone(), value, self.inner.config.ttl())
            .await;

        // A failed write may still have left the entry resident, so it is
        // tracked and capacity is enforced either way
        if let Some(recency) = state.recency.as_mut() {
            recency.touch(&key);
        }
        let enforced = self.inner.enforce_capacity(&mut state).await;

        if let Err(e) = &written {
            warn!(?key, error = %e, "Backend write failed");
        }
        written?;
        enforced
    }

    // == Delete ==
    /// Removes `key`. Deleting an absent key succeeds.
    pub async fn delete(&self, key: &K) -> Result<()> {
        let mut state = self.lock_running().await?;
        self.inner.storage.delete(key).await?;

        if let Some(recency) = state.recency.as_mut() {
            recency.remove(key);
        }

        Ok(())
    }

    // == Stop ==
    /// Stops the expiry sweep and releases the backend.
    ///
    /// A sweep in progress is allowed to finish, as are operations already
    /// holding the lock. Later calls to `get`/`put`/`delete` fail with
    /// [`CacheError::Stopped`]. Stopping again is a no-op.
    pub async fn stop(&self) -> Result<()> {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            debug!("Cache already stopped");
            return Ok(());
        }

        self.scheduler.stop().await;

        // Wait for in-flight operations before releasing the backend
        let _state = self.inner.state.lock().await;
        self.inner.storage.stop().await?;

        info!("Cache stopped");
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        let mut stats = state.stats.clone();

        match self.inner.storage.len().await {
            Ok(len) => stats.set_total_entries(len),
            Err(e) => warn!(error = %e, "Could not read resident entry count"),
        }

        stats
    }

    /// Number of entries resident in the backend, expired-but-unpurged included.
    pub async fn len(&self) -> Result<usize> {
        // Under the lock so a put's transient overflow is never observed
        let _state = self.inner.state.lock().await;
        self.inner.storage.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Runs one expiry sweep now instead of waiting for the next tick.
    pub async fn purge_expired(&self) -> SweepReport {
        self.inner.sweep().await
    }

    async fn lock_running(&self) -> Result<MutexGuard<'_, CoreState<K>>> {
        let state = self.inner.state.lock().await;
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(CacheError::Stopped);
        }
        Ok(state)
    }
}

impl<K: CacheKey, V: CacheValue> CacheInner<K, V> {
    /// Evicts least recently used entries until the backend is within capacity.
    async fn enforce_capacity(&self, state: &mut CoreState<K>) -> Result<()> {
        let capacity = self.config.capacity();
        let mut resident = self.storage.len().await?;

        while resident > capacity {
            let victim = match state.recency.as_ref() {
                Some(recency) => recency.peek_oldest().cloned(),
                None => self.storage.least_recently_used().await?,
            };

            let Some(victim) = victim else {
                warn!(resident, capacity, "Over capacity with no eviction candidate");
                break;
            };

            self.storage.delete(&victim).await?;
            if let Some(recency) = state.recency.as_mut() {
                recency.remove(&victim);
            }
            state.stats.record_eviction();
            debug!(key = ?victim, "Evicted least recently used entry");

            resident = self.storage.len().await?;
        }

        state.stats.set_total_entries(resident);
        Ok(())
    }

    /// Drops a missed key from the core recency index.
    ///
    /// Backends need not purge expired entries on read, so the entry is
    /// removed here first; otherwise it would stay resident with nothing left
    /// to evict or sweep it. A key whose removal fails stays indexed.
    async fn forget_missed(&self, state: &mut CoreState<K>, key: &K) {
        match self.storage.remove_if_expired(key).await {
            Ok(removed) => {
                if removed {
                    state.stats.record_expiration();
                    debug!(?key, "Removed expired entry on access");
                }
                if let Some(recency) = state.recency.as_mut() {
                    recency.remove(key);
                }
            }
            Err(e) => {
                warn!(?key, error = %e, "Failed to remove expired entry on access");
            }
        }
    }

    /// Keys the sweep should inspect.
    async fn sweep_keys(&self) -> Result<Vec<K>> {
        if let Some(keys) = self.storage.keys().await? {
            return Ok(keys);
        }

        // Without enumeration only keys seen by this cache can be swept
        let state = self.state.lock().await;
        Ok(state
            .recency
            .as_ref()
            .map(LruTracker::keys)
            .unwrap_or_default())
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> SweepTarget for CacheInner<K, V> {
    async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let keys = match self.sweep_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Expiry sweep could not enumerate keys");
                report.failed += 1;
                return report;
            }
        };

        for key in keys {
            // Lock per key so foreground calls interleave with a long sweep
            let mut state = self.state.lock().await;
            report.scanned += 1;

            match self.storage.remove_if_expired(&key).await {
                Ok(true) => {
                    if let Some(recency) = state.recency.as_mut() {
                        recency.remove(&key);
                    }
                    state.stats.record_expiration();
                    report.expired += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(?key, error = %e, "Failed to remove expired entry");
                    state.stats.record_sweep_failure();
                    report.failed += 1;
                }
            }
        }

        report
    }
}

impl<K: CacheKey, V: CacheValue> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<K: CacheKey, V: CacheValue> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.inner.config)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
