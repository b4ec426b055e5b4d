//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Body returned for a hit on GET /get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: String,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Acknowledgement for PUT /set and DELETE /del/:key
#[derive(Debug, Clone, Serialize)]
pub struct MutationResponse {
    /// Human readable outcome
    pub message: String,
    /// The key that was written or removed
    pub key: String,
}

impl MutationResponse {
    pub fn stored(key: impl Into<String>) -> Self {
        Self::with_verb(key.into(), "stored")
    }

    /// Also used when the key was already absent.
    pub fn deleted(key: impl Into<String>) -> Self {
        Self::with_verb(key.into(), "deleted")
    }

    fn with_verb(key: String, verb: &str) -> Self {
        Self {
            message: format!("Key '{key}' {verb}"),
            key,
        }
    }
}

/// Body for GET /stats: the cache counters plus the derived hit rate.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" while serving, "stopped" once the cache is stopped
    pub status: &'static str,
    /// RFC 3339 time of the check
    pub timestamp: String,
}

impl HealthResponse {
    pub fn for_cache(stopped: bool) -> Self {
        Self {
            status: if stopped { "stopped" } else { "healthy" },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
