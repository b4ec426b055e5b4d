//! File Store
//!
//! Persists a [`MemoryStore`] as a JSON snapshot of `[key, entry]` pairs,
//! least recently used first.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, Clock, Lookup, SystemClock};
use crate::config::SyncMode;
use crate::error::Result;
use crate::storage::{CacheKey, CacheValue, MemoryStore, Storage};

// == File Store ==
/// Persistence-capable backend on top of [`MemoryStore`].
pub struct FileStore<K: CacheKey, V: CacheValue> {
    path: PathBuf,
    memory: MemoryStore<K, V>,
    sync: SyncMode,
    /// Serializes snapshot writes
    write_lock: Mutex<()>,
    stopped: AtomicBool,
}

impl<K, V> FileStore<K, V>
where
    K: CacheKey + Serialize + DeserializeOwned,
    V: CacheValue + Serialize + DeserializeOwned,
{
    /// Opens the snapshot at `path` on the system clock.
    ///
    /// A missing file starts an empty store. An unreadable or corrupt file is
    /// reported and discarded; opening never fails.
    pub async fn open(path: impl Into<PathBuf>, sync: SyncMode) -> Self {
        Self::open_with_clock(path, sync, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        path: impl Into<PathBuf>,
        sync: SyncMode,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let path = path.into();
        let memory = MemoryStore::with_clock(clock);

        if let Some(entries) = load_snapshot::<K, V>(&path).await {
            info!(path = %path.display(), entries = entries.len(), "Loaded cache snapshot");
            memory.restore(entries).await;
        }

        Self {
            path,
            memory,
            sync,
            write_lock: Mutex::new(()),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current entries to disk.
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let entries = self.memory.snapshot().await;
        let bytes = serde_json::to_vec(&entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target then rename over it
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), entries = entries.len(), "Flushed cache snapshot");
        Ok(())
    }

    async fn after_write(&self) -> Result<()> {
        match self.sync {
            SyncMode::EveryWrite => self.flush().await,
            SyncMode::OnStop => Ok(()),
        }
    }
}

/// Sibling of `path` with `.tmp` appended to the full file name.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads a snapshot, returning `None` when there is nothing usable.
async fn load_snapshot<K, V>(path: &Path) -> Option<Vec<(K, CacheEntry<V>)>>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No cache snapshot, starting empty");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable cache snapshot, starting empty");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Discarding corrupt cache snapshot");
            None
        }
    }
}

#[async_trait]
impl<K, V> Storage<K, V> for FileStore<K, V>
where
    K: CacheKey + Serialize + DeserializeOwned,
    V: CacheValue + Serialize + DeserializeOwned,
{
    async fn get(&self, key: &K) -> Result<Lookup<V>> {
        // Lazily removed entries stay in the file until the next write
        self.memory.get(key).await
    }

    async fn put(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        self.memory.put(key, value, ttl).await?;
        self.after_write().await
    }

    async fn delete(&self, key: &K) -> Result<()> {
        self.memory.delete(key).await?;
        self.after_write().await
    }

    async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let flushed = self.flush().await;
        self.memory.stop().await?;
        info!(path = %self.path.display(), "File store stopped");
        flushed
    }

    async fn len(&self) -> Result<usize> {
        self.memory.len().await
    }

    async fn remove_if_expired(&self, key: &K) -> Result<bool> {
        let removed = self.memory.remove_if_expired(key).await?;
        if removed {
            self.after_write().await?;
        }
        Ok(removed)
    }

    async fn keys(&self) -> Result<Option<Vec<K>>> {
        self.memory.keys().await
    }

    fn tracks_recency(&self) -> bool {
        true
    }

    async fn least_recently_used(&self) -> Result<Option<K>> {
        self.memory.least_recently_used().await
    }
}
