//! Cache Entry Module
//!
//! Defines stored entries with an absolute expiry and the hit/miss result of a lookup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A stored value with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry that expires `ttl` after `now_ms`.
    pub fn new(value: V, ttl: Duration, now_ms: u64) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        Self {
            value,
            expires_at: now_ms.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// Boundary condition: an entry whose expiry is at or before the current
    /// time is expired, so a zero TTL yields an entry that is never visible.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }
}

// == Lookup ==
/// Result of reading a key: the live value, or a miss.
///
/// A miss covers both absent and expired keys and is distinct from every
/// value the cache can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Hit(V),
    Miss,
}

impl<V> Lookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss)
    }

    /// Converts into an `Option`, `None` on a miss.
    pub fn into_option(self) -> Option<V> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss => None,
        }
    }

    pub fn map<U, F: FnOnce(V) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Hit(value) => Lookup::Hit(f(value)),
            Lookup::Miss => Lookup::Miss,
        }
    }
}

impl<V> From<Option<V>> for Lookup<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(value) => Lookup::Hit(value),
            None => Lookup::Miss,
        }
    }
}
