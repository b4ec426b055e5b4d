//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{Cache, Lookup};
use crate::error::{CacheError, Result};
use crate::models::{GetResponse, HealthResponse, MutationResponse, SetRequest, StatsResponse};

/// Application state shared across all handlers.
///
/// `Cache` is a cloneable handle with its own locking, so no outer lock is needed.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: Cache<String, String>,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: Cache<String, String>) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair with the cache's TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<MutationResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.put(req.key.clone(), req.value).await?;

    Ok(Json(MutationResponse::stored(req.key)))
}

/// Handler for GET /get/:key
///
/// A miss maps to 404; backend failures surface as errors of their own.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await? {
        Lookup::Hit(value) => Ok(Json(GetResponse::new(key, value))),
        Lookup::Miss => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
///
/// Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MutationResponse>> {
    state.cache.delete(&key).await?;

    Ok(Json(MutationResponse::deleted(key)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().await.into())
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::for_cache(state.cache.is_stopped()))
}
