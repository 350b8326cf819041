//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::models::{
    CullResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// The cache holds no state beyond its table handle, so handlers share it
/// without an outer lock.
#[derive(Clone)]
pub struct AppState {
    /// Table-backed cache
    pub cache: Cache,
}

impl AppState {
    /// Creates a new AppState with the given cache.
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens the SQLite table named in the Config.
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Ok(Self::new(Cache::open(config)?))
    }
}

/// Runs a cache call on the blocking thread pool.
pub(crate) async fn run_blocking<T, F>(cache: Cache, f: F) -> Result<T>
where
    F: FnOnce(&Cache) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&cache))
        .await
        .map_err(|e| CacheError::Internal(format!("Cache task failed: {}", e)))?
}

/// Handler for PUT /set
///
/// Stores a JSON value in the cache with optional TTL. The document is kept
/// as its JSON text. A write dropped by the table still answers 200.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let SetRequest { key, value, ttl } = req;
    let document = serde_json::to_string(&value)?;
    let write_key = key.clone();
    run_blocking(state.cache, move |cache| {
        cache.set_with_ttl(&write_key, &document, ttl)
    })
    .await?;

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key. Missing and expired keys are 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let read_key = key.clone();
    let document: Option<String> =
        run_blocking(state.cache, move |cache| cache.lookup(&read_key)).await?;

    match document {
        Some(document) => {
            let value: Value = serde_json::from_str(&document)?;
            Ok(Json(GetResponse::new(key, value)))
        }
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache. Deleting a missing key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let delete_key = key.clone();
    let removed = run_blocking(state.cache, move |cache| cache.delete(&delete_key)).await?;

    Ok(Json(DeleteResponse::new(key, removed)))
}

/// Handler for POST /cull
///
/// Removes every expired row.
pub async fn cull_handler(State(state): State<AppState>) -> Result<Json<CullResponse>> {
    let removed = run_blocking(state.cache, |cache| cache.cull()).await?;

    Ok(Json(CullResponse { removed }))
}

/// Handler for GET /stats
///
/// Reports the physical row count and the cache tuning.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let max_entries = state.cache.max_entries();
    let timeout = state.cache.timeout();
    let total_rows = run_blocking(state.cache, |cache| cache.len()).await?;

    Ok(Json(StatsResponse {
        total_rows,
        max_entries,
        timeout,
    }))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
