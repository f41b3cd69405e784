//! API Handlers
//!
//! HTTP request handlers for each pool server endpoint. Pool calls do
//! blocking medium I/O, so they run on the blocking thread pool while an
//! owned pool lock is held.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Duration;

use crate::cache::{CacheItem, DynPool};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, CommitResponse, DeleteResponse, HealthResponse, ItemResponse, PutItemRequest,
    SaveResponse, StatsResponse,
};
use crate::registry::Registry;

/// Application state shared across all handlers.
///
/// One pool instance serves every request; the mutex serialises access.
#[derive(Clone)]
pub struct AppState {
    /// The pool behind the API
    pub pool: Arc<Mutex<DynPool>>,
    /// Strategy the pool was built with
    pub strategy: Arc<str>,
}

impl AppState {
    /// Creates a new AppState around an existing pool.
    pub fn new(pool: DynPool, strategy: impl Into<Arc<str>>) -> Self {
        Self {
            pool: Arc::new(Mutex::new(pool)),
            strategy: strategy.into(),
        }
    }

    /// Builds the pool named by the configuration through `registry`.
    pub fn from_config(config: &Config, registry: &Registry) -> Result<Self> {
        let pool = registry.create(&config.strategy, config.strategy_options())?;
        Ok(Self::new(pool, config.strategy.as_str()))
    }
}

/// Runs `op` against the pool on the blocking thread pool.
async fn with_pool<T, F>(state: &AppState, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut DynPool) -> Result<T> + Send + 'static,
{
    let mut pool = state.pool.clone().lock_owned().await;
    task::spawn_blocking(move || op(&mut *pool))
        .await
        .map_err(|err| CacheError::Storage(format!("pool task failed: {}", err)))?
}

/// Handler for GET /items/:key
pub async fn get_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ItemResponse>> {
    let item = with_pool(&state, move |pool| pool.get_item(&key)).await?;

    Ok(Json(ItemResponse::from_item(&item)))
}

/// Handler for PUT /items/:key
///
/// Saves immediately, or defers when the request asks for it.
pub async fn put_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutItemRequest>,
) -> Result<Json<SaveResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidArgument(error_msg));
    }

    let mut item = CacheItem::with_value(key.as_str(), req.value)?;
    match req.ttl {
        Some(0) => {
            item.expires_after(None);
        }
        Some(secs) => {
            let ttl = Duration::try_seconds(secs).ok_or_else(|| {
                CacheError::InvalidArgument(format!("TTL {} is out of range", secs))
            })?;
            item.expires_after(Some(ttl));
        }
        None => {}
    }

    let deferred = req.deferred;
    let saved = with_pool(&state, move |pool| {
        if deferred {
            pool.save_deferred(item)
        } else {
            pool.save(item)
        }
    })
    .await?;

    Ok(Json(SaveResponse::new(key, saved, deferred)))
}

/// Handler for DELETE /items/:key
pub async fn delete_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let target = key.clone();
    let deleted = with_pool(&state, move |pool| pool.delete_item(&target)).await?;

    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for DELETE /items
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let cleared = with_pool(&state, |pool| Ok(pool.clear())).await?;
    Ok(Json(ClearResponse { cleared }))
}

/// Handler for POST /commit
pub async fn commit_handler(State(state): State<AppState>) -> Result<Json<CommitResponse>> {
    let committed = with_pool(&state, |pool| Ok(pool.commit())).await?;
    Ok(Json(CommitResponse { committed }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let pool = state.pool.lock().await;
    Json(StatsResponse::from(pool.stats()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(&*state.strategy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_state() -> AppState {
        let config = Config::default();
        AppState::from_config(&config, &Registry::new()).unwrap()
    }

    fn put(value: serde_json::Value, ttl: Option<i64>, deferred: bool) -> Json<PutItemRequest> {
        Json(PutItemRequest {
            value,
            ttl,
            deferred,
        })
    }

    #[tokio::test]
    async fn test_put_and_get_handler() {
        let state = memory_state();

        let result = put_item_handler(
            State(state.clone()),
            Path("test_key".to_string()),
            put(json!("test_value"), None, false),
        )
        .await
        .unwrap();
        assert!(result.saved);

        let response = get_item_handler(State(state), Path("test_key".to_string()))
            .await
            .unwrap();
        assert!(response.hit);
        assert_eq!(response.value, Some(json!("test_value")));
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_miss() {
        let state = memory_state();

        let response = get_item_handler(State(state), Path("nonexistent".to_string()))
            .await
            .unwrap();
        assert!(!response.hit);
        assert!(response.value.is_none());
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let state = memory_state();

        let result = get_item_handler(State(state), Path("bad-key".to_string())).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_deferred_put_then_commit() {
        let state = memory_state();

        let result = put_item_handler(
            State(state.clone()),
            Path("later".to_string()),
            put(json!(5), Some(60), true),
        )
        .await
        .unwrap();
        assert!(result.deferred);
        assert_eq!(stats_handler(State(state.clone())).await.deferred, 1);

        assert!(commit_handler(State(state.clone())).await.unwrap().committed);
        let stats = stats_handler(State(state)).await;
        assert_eq!((stats.committed, stats.deferred), (1, 0));
    }

    #[tokio::test]
    async fn test_delete_and_clear_handlers() {
        let state = memory_state();
        put_item_handler(
            State(state.clone()),
            Path("to_delete".to_string()),
            put(json!("v"), None, false),
        )
        .await
        .unwrap();

        let response = delete_item_handler(State(state.clone()), Path("to_delete".to_string()))
            .await
            .unwrap();
        assert!(response.deleted);

        assert!(clear_handler(State(state)).await.unwrap().cleared);
    }

    #[tokio::test]
    async fn test_negative_ttl_rejected() {
        let state = memory_state();

        let result = put_item_handler(
            State(state),
            Path("k".to_string()),
            put(json!("v"), Some(-5), false),
        )
        .await;
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_rejected() {
        let state = memory_state();

        let result = put_item_handler(
            State(state.clone()),
            Path("k".to_string()),
            put(json!("v"), Some(100_000_000_000_000_000), false),
        )
        .await;
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
        assert_eq!(stats_handler(State(state)).await.committed, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_puts_all_land() {
        let state = memory_state();

        let mut puts = task::JoinSet::new();
        for n in 0..16 {
            puts.spawn(put_item_handler(
                State(state.clone()),
                Path(format!("key.{}", n)),
                put(json!(n), None, false),
            ));
        }
        while let Some(response) = puts.join_next().await {
            assert!(response.unwrap().unwrap().saved);
        }

        assert_eq!(stats_handler(State(state)).await.committed, 16);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler(State(memory_state())).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.strategy, "memory");
    }
}
