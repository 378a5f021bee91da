//! Sync orchestration endpoints

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::auth::resolve_merchant;
use crate::api::state::ApiState;
use crate::api::types::ApiError;
use crate::data::postgres::repositories::product;

/// Build sync routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/status", get(status))
        .route("/trigger", post(trigger))
        .route("/force-resync", post(force_resync))
        .route("/reconcile", post(reconcile))
        .route("/scheduler/status", get(scheduler_status))
        .route("/scheduler/trigger", post(scheduler_trigger))
}

#[derive(Debug, Deserialize, Default)]
pub struct TriggerRequest {
    /// Run in the background and return immediately (the default)
    #[serde(default = "default_background")]
    pub background: bool,
}

fn default_background() -> bool {
    true
}

/// GET /api/sync/status - last sync time plus mirror counts
pub async fn status(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    let stats = product::product_stats(&state.pool, &store.merchant_id)
        .await
        .map_err(ApiError::from_db)?;

    Ok(Json(serde_json::json!({
        "last_synced_at": store.last_synced_at,
        "products": {
            "total": stats.total,
            "live": stats.live,
            "deleted": stats.deleted,
            "with_embedding": stats.with_embedding,
        },
    })))
}

/// POST /api/sync/trigger - run a full catalog sync.
///
/// Defaults to background execution with an immediate 202; pass
/// `{"background": false}` to wait for the report.
pub async fn trigger(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Option<Json<TriggerRequest>>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    let request = body.map(|Json(b)| b).unwrap_or_default();

    if request.background {
        let sync = state.sync.clone();
        let merchant_id = store.merchant_id.clone();
        tokio::spawn(async move {
            if let Err(e) = sync.full_sync(&store).await {
                tracing::error!(merchant_id = %merchant_id, error = %e, "Background sync failed");
            }
        });
        return Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "started" })),
        ));
    }

    let report = state.sync.full_sync(&store).await.map_err(ApiError::from_sync)?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "report": report }))))
}

/// POST /api/sync/force-resync - full sync run inline, returning the report
pub async fn force_resync(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    let report = state.sync.full_sync(&store).await.map_err(ApiError::from_sync)?;
    Ok(Json(serde_json::json!({ "report": report })))
}

/// POST /api/sync/reconcile - diff the mirror against the provider catalog
pub async fn reconcile(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    let report = state.sync.reconcile(&store).await.map_err(ApiError::from_sync)?;
    Ok(Json(serde_json::json!({ "report": report })))
}

/// GET /api/sync/scheduler/status
pub async fn scheduler_status(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let status = state.scheduler.status().await;
    Json(serde_json::json!({ "scheduler": status }))
}

/// POST /api/sync/scheduler/trigger - run the sweep across all stores now
pub async fn scheduler_trigger(
    State(state): State<ApiState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let scheduler = state.scheduler.clone();
    tokio::spawn(async move {
        let entries = scheduler.run_sweep().await;
        tracing::info!(stores = entries.len(), "Manual sweep finished");
    });
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "started" })),
    )
}
