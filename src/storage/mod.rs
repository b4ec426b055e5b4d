//! Storage Module
//!
//! The contract every backend satisfies, plus the bundled backends.
//!
//! # Backends
//! - [`MemoryStore`]: volatile, tracks recency natively
//! - [`FileStore`]: [`MemoryStore`] persisted as a JSON snapshot

mod file;
mod memory;

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::Lookup;
use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Bounds required of cache keys.
pub trait CacheKey: Hash + Eq + Clone + Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Hash + Eq + Clone + Debug + Send + Sync + 'static {}

/// Bounds required of cached values.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

// == Storage Contract ==
/// Port for cache backends.
///
/// Ordinary absence or expiry is reported as [`Lookup::Miss`]; an `Err` always
/// means the backend itself failed.
#[async_trait]
pub trait Storage<K: CacheKey, V: CacheValue>: Send + Sync + 'static {
    /// Returns the live value for `key`. Backends may drop an entry they
    /// observe to be expired.
    async fn get(&self, key: &K) -> Result<Lookup<V>>;

    /// Stores `value` expiring `ttl` from now, replacing any previous entry.
    /// The write is visible to later `get` calls on this instance once this returns.
    async fn put(&self, key: K, value: V, ttl: Duration) -> Result<()>;

    /// Removes `key`. Absent keys are not an error.
    async fn delete(&self, key: &K) -> Result<()>;

    /// Flushes buffered state and releases resources. Calling it again is a no-op.
    async fn stop(&self) -> Result<()>;

    /// Number of physically resident entries, expired ones included.
    async fn len(&self) -> Result<usize>;

    /// Removes `key` only if it is present and expired, in one step.
    /// Returns whether an entry was removed.
    async fn remove_if_expired(&self, key: &K) -> Result<bool>;

    /// Enumerates stored keys, or `None` if the backend cannot.
    async fn keys(&self) -> Result<Option<Vec<K>>> {
        Ok(None)
    }

    /// Whether this backend orders its entries by recency of access.
    fn tracks_recency(&self) -> bool {
        false
    }

    /// The least recently used key. Only meaningful when [`Storage::tracks_recency`] is true.
    async fn least_recently_used(&self) -> Result<Option<K>> {
        Ok(None)
    }
}
