//! Configuration Module
//!
//! [`CacheConfig`] holds the immutable policy of a single cache instance.
//! [`Config`] is the server configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default interval between expiry sweeps.
pub const DEFAULT_EXPIRY_CHECK_INTERVAL: Duration = Duration::from_millis(1000);

// == Cache Config ==
/// Capacity and TTL policy for a cache instance.
///
/// Built through validating constructors and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    capacity: usize,
    ttl: Duration,
    expiry_check_interval: Duration,
}

impl CacheConfig {
    /// Creates a config with the default expiry check interval.
    ///
    /// Fails if `capacity` is zero. A zero `ttl` is accepted; entries written
    /// with it are expired as soon as they are stored.
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            ttl,
            expiry_check_interval: DEFAULT_EXPIRY_CHECK_INTERVAL,
        })
    }

    /// Creates a config from millisecond values.
    pub fn from_millis(capacity: usize, ttl_ms: u64, expiry_check_interval_ms: u64) -> Result<Self> {
        Self::new(capacity, Duration::from_millis(ttl_ms))?
            .with_expiry_check_interval(Duration::from_millis(expiry_check_interval_ms))
    }

    /// Returns a copy with a different sweep interval. The interval must be positive.
    pub fn with_expiry_check_interval(self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "expiry check interval must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            expiry_check_interval: interval,
            ..self
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expiry_check_interval(&self) -> Duration {
        self.expiry_check_interval
    }
}

// == Storage Selection ==
/// When the file backend writes its snapshot to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Persist after every mutation
    #[default]
    EveryWrite,
    /// Persist only on flush or stop
    OnStop,
}

impl SyncMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "write" | "every_write" => Some(SyncMode::EveryWrite),
            "stop" | "on_stop" => Some(SyncMode::OnStop),
            _ => None,
        }
    }
}

/// Storage backend the server runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Volatile in-process store
    Memory,
    /// JSON snapshot file
    File { path: PathBuf, sync: SyncMode },
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// TTL in milliseconds applied to every write
    pub default_ttl_ms: u64,
    /// Interval in milliseconds between expiry sweeps
    pub expiry_check_interval_ms: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Storage backend
    pub storage: StorageBackend,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `DEFAULT_TTL_MS` - TTL in milliseconds (default: 300000)
    /// - `EXPIRY_CHECK_INTERVAL_MS` - Sweep frequency in milliseconds (default: 1000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `STORAGE_BACKEND` - `memory` or `file` (default: memory)
    /// - `STORAGE_PATH` - Snapshot path for the file backend (default: cache.json)
    /// - `STORAGE_SYNC` - `write` or `stop` (default: write)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let storage = match env::var("STORAGE_BACKEND")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            Ok("file") => StorageBackend::File {
                path: env::var("STORAGE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("cache.json")),
                sync: env::var("STORAGE_SYNC")
                    .ok()
                    .and_then(|v| SyncMode::parse(&v))
                    .unwrap_or_default(),
            },
            _ => StorageBackend::Memory,
        };

        Self {
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl_ms: parse_var("DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            expiry_check_interval_ms: parse_var("EXPIRY_CHECK_INTERVAL_MS")
                .unwrap_or(defaults.expiry_check_interval_ms),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            storage,
        }
    }

    /// Validates the cache policy part of this config.
    pub fn cache_config(&self) -> Result<CacheConfig> {
        CacheConfig::from_millis(
            self.max_entries,
            self.default_ttl_ms,
            self.expiry_check_interval_ms,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_ms: 300_000,
            expiry_check_interval_ms: DEFAULT_EXPIRY_CHECK_INTERVAL.as_millis() as u64,
            server_port: 3000,
            storage: StorageBackend::Memory,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
