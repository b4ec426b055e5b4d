//! Expiring LRU - an in-process cache with LRU eviction and TTL expiry
//!
//! The [`Cache`] core runs the same eviction and expiry policy over any
//! [`Storage`] backend. [`MemoryStore`] and [`FileStore`] are bundled; the
//! `api` module serves a `Cache<String, String>` over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, Lookup};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use storage::{FileStore, MemoryStore, Storage};
