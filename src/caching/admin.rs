//! # Cache Admin Interface
//!
//! Control routes for the response cache:
//! - `/clear-cache` (any method) empties the store
//! - [`get_cache_stats`] returns a JSON statistics snapshot; the server mounts it only
//!   when a stats path is configured, since any mounted path is hidden from the upstream

use super::{CacheStats, CacheStore};
use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::Json,
    routing::any,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Path of the clear route
pub const CLEAR_CACHE_PATH: &str = "/clear-cache";

/// Cache statistics response
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub stats: CacheStats,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Cache admin router
pub struct CacheAdminRouter;

impl CacheAdminRouter {
    /// Always-on admin routes for any router state that can hand out the shared store
    pub fn routes<S>() -> Router<S>
    where
        Arc<CacheStore>: FromRef<S>,
        S: Clone + Send + Sync + 'static,
    {
        Router::new().route(CLEAR_CACHE_PATH, any(clear_cache))
    }
}

/// Empty the cache
pub async fn clear_cache(State(cache): State<Arc<CacheStore>>) -> (StatusCode, &'static str) {
    let removed = cache.clear();
    info!(removed, "Cache cleared via admin route");
    (StatusCode::OK, "Cache cleared")
}

/// Get cache statistics
pub async fn get_cache_stats(State(cache): State<Arc<CacheStore>>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        stats: cache.stats(),
        timestamp: chrono::Utc::now(),
    })
}
