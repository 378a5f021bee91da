//! Webhook management endpoints and the public delivery receiver

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::auth::resolve_merchant;
use crate::api::state::ApiState;
use crate::api::types::ApiError;
use crate::data::postgres::repositories::store;
use crate::data::types::{StoreRow, UpsertOutcome};
use crate::domain::webhooks::verification::{self, ProductEvent};

/// Management routes, behind API key auth
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/register", post(register))
        .route("/list", get(list))
        .route("/delete/{wc_webhook_id}", delete(delete_one))
        .route("/sync", post(sync))
}

/// POST /api/webhooks/register - ensure all product topics are subscribed
pub async fn register(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = resolve_merchant(&state.pool, &headers).await?;
    let client = state.sync.client_for_store(&row).map_err(ApiError::from_sync)?;
    let report = state
        .webhooks
        .register_all(&row, &client)
        .await
        .map_err(ApiError::from_webhooks)?;
    Ok(Json(serde_json::json!({ "registration": report })))
}

/// GET /api/webhooks/list - merged local + provider subscription view
pub async fn list(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = resolve_merchant(&state.pool, &headers).await?;
    let client = state.sync.client_for_store(&row).map_err(ApiError::from_sync)?;
    let webhooks = state
        .webhooks
        .list(&row, &client)
        .await
        .map_err(ApiError::from_webhooks)?;
    Ok(Json(serde_json::json!({ "webhooks": webhooks })))
}

/// DELETE /api/webhooks/delete/{wc_webhook_id}
pub async fn delete_one(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(wc_webhook_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = resolve_merchant(&state.pool, &headers).await?;
    let client = state.sync.client_for_store(&row).map_err(ApiError::from_sync)?;
    let removed = state
        .webhooks
        .delete(&row, &client, wc_webhook_id)
        .await
        .map_err(ApiError::from_webhooks)?;
    if !removed {
        return Err(ApiError::not_found(
            "WEBHOOK_NOT_FOUND",
            "No such webhook for this store",
        ));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// POST /api/webhooks/sync - reconcile local rows with provider state
pub async fn sync(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = resolve_merchant(&state.pool, &headers).await?;
    let client = state.sync.client_for_store(&row).map_err(ApiError::from_sync)?;
    let report = state
        .webhooks
        .sync(&row, &client)
        .await
        .map_err(ApiError::from_webhooks)?;
    Ok(Json(serde_json::json!({ "sync": report })))
}

/// Secret used to authenticate deliveries. Absent or empty means the
/// store never completed webhook registration; such deliveries are
/// rejected rather than verified against an empty key.
fn delivery_secret(row: &StoreRow) -> Option<&str> {
    row.webhook_secret.as_deref().filter(|s| !s.is_empty())
}

/// POST /api/webhooks/product/{event} - the public delivery receiver.
///
/// Authenticated by the per-store HMAC signature, not the API key. The
/// source store is resolved from the `X-WC-Webhook-Source` header and
/// the signature is checked against that store's secret before the body
/// is parsed.
pub async fn receive_delivery(
    State(state): State<ApiState>,
    Path(event): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path_event = ProductEvent::from_topic(&format!("product.{}", event)).ok_or_else(|| {
        ApiError::not_found("UNKNOWN_EVENT", "Unknown webhook event")
    })?;

    let source = verification::delivery_source(&headers).ok_or_else(|| {
        ApiError::bad_request("SOURCE_MISSING", "X-WC-Webhook-Source header is required")
    })?;
    let row = store::get_store_by_url(&state.pool, &source)
        .await
        .map_err(ApiError::from_db)?
        .ok_or_else(|| ApiError::not_found("STORE_NOT_FOUND", "Unknown source store"))?;
    if !row.is_active {
        return Err(ApiError::forbidden(
            "STORE_INACTIVE",
            "Store connection is disconnected",
        ));
    }

    let Some(secret) = delivery_secret(&row) else {
        tracing::warn!(
            merchant_id = %row.merchant_id,
            "Rejected webhook delivery for store without a registered secret"
        );
        return Err(ApiError::unauthorized(
            "WEBHOOK_NOT_REGISTERED",
            "Webhook not registered or missing secret",
        ));
    };
    if !verification::verify_delivery(&headers, &body, secret) {
        tracing::warn!(
            merchant_id = %row.merchant_id,
            event = %path_event,
            "Rejected webhook delivery with bad signature"
        );
        return Err(ApiError::unauthorized(
            "INVALID_SIGNATURE",
            "Webhook signature verification failed",
        ));
    }

    // The topic header wins over the path when both are present
    let event = verification::delivery_event(&headers).unwrap_or(path_event);
    state
        .webhooks
        .record_verified_delivery(&row, event)
        .await
        .map_err(ApiError::from_webhooks)?;

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            return Err(ApiError::bad_request(
                "INVALID_BODY",
                "Delivery body is not valid JSON",
            ));
        }
    };

    // Subscription pings carry no product id
    let Some(wc_product_id) = payload.get("id").and_then(|v| v.as_i64()) else {
        tracing::debug!(merchant_id = %row.merchant_id, "Webhook ping acknowledged");
        return Ok(Json(serde_json::json!({ "status": "ok", "ping": true })));
    };

    let result = match event {
        ProductEvent::Created | ProductEvent::Updated => state
            .sync
            .apply_product_payload(&row, &payload)
            .await
            .map(|outcome| match outcome {
                UpsertOutcome::Created => "created",
                UpsertOutcome::Updated => "updated",
                UpsertOutcome::Skipped => "skipped",
            }),
        ProductEvent::Deleted => state
            .sync
            .delete_product(&row, wc_product_id)
            .await
            .map(|deleted| if deleted { "deleted" } else { "not_found" }),
        ProductEvent::Restored => state
            .sync
            .restore_product(&row, wc_product_id)
            .await
            .map(|restored| if restored { "restored" } else { "not_found" }),
    };

    match result {
        Ok(outcome) => Ok(Json(serde_json::json!({
            "status": "ok",
            "event": event.topic(),
            "outcome": outcome,
        }))),
        Err(e) => {
            tracing::error!(
                merchant_id = %row.merchant_id,
                event = %event,
                wc_product_id,
                error = %e,
                "Webhook delivery processing failed"
            );
            Err(ApiError::from_sync(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn store_row(webhook_secret: Option<&str>) -> StoreRow {
        StoreRow {
            id: 1,
            merchant_id: "m1".to_string(),
            store_url: "https://shop.example.com".to_string(),
            consumer_key: "enc:v1:a:b".to_string(),
            consumer_secret: "enc:v1:a:b".to_string(),
            webhook_secret: webhook_secret.map(String::from),
            api_version: "wc/v3".to_string(),
            is_active: true,
            is_verified: true,
            wp_version: None,
            wc_version: None,
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_delivery_secret_requires_registration() {
        assert_eq!(delivery_secret(&store_row(Some("s3cret"))), Some("s3cret"));
        assert_eq!(delivery_secret(&store_row(Some(""))), None);
        assert_eq!(delivery_secret(&store_row(None)), None);
    }
}
