//! Cache Module
//!
//! LRU eviction and TTL expiry over a pluggable storage backend.

mod clock;
mod entry;
mod recency;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Lookup};
pub use recency::LruTracker;
pub use stats::CacheStats;
pub use store::Cache;
