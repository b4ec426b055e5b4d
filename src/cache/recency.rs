//! Recency Tracker Module
//!
//! Recency index kept by the cache core for backends that cannot report
//! their own least recently used key.

use std::fmt;
use std::hash::Hash;

use lru::LruCache;

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Backed by an unbounded `LruCache` so touch, remove and eviction are O(1).
pub struct LruTracker<K: Hash + Eq> {
    /// Keys by access time, values unused
    order: LruCache<K, ()>,
}

impl<K: Hash + Eq + Clone> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: LruCache::unbounded(),
        }
    }

    // == Touch ==
    /// Marks a key as most recently used, inserting it if new.
    pub fn touch(&mut self, key: &K) {
        if self.order.get(key).is_none() {
            self.order.put(key.clone(), ());
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &K) {
        self.order.pop(key);
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.peek_lru().map(|(key, _)| key)
    }

    /// Returns all tracked keys, least recently used first.
    pub fn keys(&self) -> Vec<K> {
        self.order.iter().rev().map(|(key, _)| key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.order.contains(key)
    }
}

impl<K: Hash + Eq + Clone> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq> fmt::Debug for LruTracker<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruTracker")
            .field("len", &self.order.len())
            .finish()
    }
}
