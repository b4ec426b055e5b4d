//! API Routes
//!
//! Axum router for the cache server.

use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_handler, health_handler, set_handler, stats_handler, AppState,
};

/// Builds the full router: key-value routes, ops routes, CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    key_value_routes()
        .merge(ops_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `PUT /set`, `GET /get/:key`, `DELETE /del/:key`
fn key_value_routes() -> Router<AppState> {
    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
}

/// `GET /stats`, `GET /health`
fn ops_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
}
