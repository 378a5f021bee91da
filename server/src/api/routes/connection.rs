//! Store connection management endpoints

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde::Serialize;

use crate::api::auth::{HEADER_MERCHANT_ID, resolve_merchant_unchecked};
use crate::api::state::ApiState;
use crate::api::types::ApiError;
use crate::data::postgres::repositories::store;
use crate::data::types::StoreRow;
use crate::domain::wc::WcClient;
use crate::utils::crypto::generate_secret;

/// Build connection routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/setup", post(setup))
        .route("/verify", post(verify))
        .route("/status", get(status))
        .route("/disconnect", delete(disconnect))
        .route("/reconnect", post(reconnect))
}

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub store_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct ReconnectRequest {
    pub consumer_key: String,
    pub consumer_secret: String,
}

/// Store connection as returned to API consumers (credentials excluded)
#[derive(Debug, Serialize)]
pub struct StoreDto {
    pub merchant_id: String,
    pub store_url: String,
    pub api_version: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub wp_version: Option<String>,
    pub wc_version: Option<String>,
    pub last_synced_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<StoreRow> for StoreDto {
    fn from(row: StoreRow) -> Self {
        Self {
            merchant_id: row.merchant_id,
            store_url: row.store_url,
            api_version: row.api_version,
            is_active: row.is_active,
            is_verified: row.is_verified,
            wp_version: row.wp_version,
            wc_version: row.wc_version,
            last_synced_at: row.last_synced_at,
            created_at: row.created_at,
        }
    }
}

fn merchant_id_header(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(HEADER_MERCHANT_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            ApiError::bad_request("MERCHANT_ID_MISSING", "X-Merchant-Id header is required")
        })
}

fn normalize_store_url(url: &str) -> Result<String, ApiError> {
    let url = url.trim().trim_end_matches('/');
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ApiError::bad_request(
            "INVALID_STORE_URL",
            "Store URL must start with http:// or https://",
        ));
    }
    Ok(url.to_string())
}

/// Connect a new store: verify credentials against the store, persist
/// them encrypted, register webhooks, and kick off the initial catalog
/// sync in the background.
pub async fn setup(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<SetupRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let merchant_id = merchant_id_header(&headers)?;
    let store_url = normalize_store_url(&body.store_url)?;
    if body.consumer_key.is_empty() || body.consumer_secret.is_empty() {
        return Err(ApiError::bad_request(
            "MISSING_CREDENTIALS",
            "consumer_key and consumer_secret are required",
        ));
    }

    // Duplicate checks before touching the provider
    if store::get_store_by_merchant(&state.pool, &merchant_id)
        .await
        .map_err(ApiError::from_db)?
        .is_some()
    {
        return Err(ApiError::conflict(
            "MERCHANT_ALREADY_CONNECTED",
            "This merchant already has a connected store",
        ));
    }
    if store::get_store_by_url(&state.pool, &store_url)
        .await
        .map_err(ApiError::from_db)?
        .is_some()
    {
        return Err(ApiError::conflict(
            "STORE_ALREADY_CONNECTED",
            "This store URL is already connected",
        ));
    }

    // Verify credentials against the live store
    let client = WcClient::new(
        &store_url,
        &state.config.woocommerce.api_version,
        &body.consumer_key,
        &body.consumer_secret,
        state.config.woocommerce.request_timeout_secs,
    )
    .map_err(|_| ApiError::bad_request("INVALID_STORE_URL", "Store URL is not valid"))?;

    let info = client.verify_connection().await.map_err(|e| {
        tracing::warn!(merchant_id = %merchant_id, error = %e, "Credential verification failed");
        ApiError::bad_request(
            "VERIFICATION_FAILED",
            "Could not verify store credentials",
        )
    })?;

    let consumer_key = state
        .cipher
        .encrypt(&body.consumer_key)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let consumer_secret = state
        .cipher
        .encrypt(&body.consumer_secret)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let webhook_secret = generate_secret(state.config.webhooks.secret_length);

    let row = match store::create_store(
        &state.pool,
        &merchant_id,
        &store_url,
        &consumer_key,
        &consumer_secret,
        &webhook_secret,
        &state.config.woocommerce.api_version,
    )
    .await
    {
        Ok(row) => row,
        Err(e) if e.is_unique_violation() => {
            return Err(ApiError::conflict(
                "STORE_ALREADY_CONNECTED",
                "This merchant or store URL is already connected",
            ));
        }
        Err(e) => return Err(ApiError::from_db(e)),
    };

    store::mark_store_verified(
        &state.pool,
        row.id,
        info.wp_version.as_deref(),
        info.wc_version.as_deref(),
    )
    .await
    .map_err(ApiError::from_db)?;

    // Re-read so the response reflects the verified state
    let row = store::get_store_by_merchant(&state.pool, &merchant_id)
        .await
        .map_err(ApiError::from_db)?
        .ok_or_else(|| ApiError::internal("Store vanished after creation"))?;

    let registration = state
        .webhooks
        .register_all(&row, &client)
        .await
        .map_err(ApiError::from_webhooks)?;

    // Initial catalog sync runs in the background
    let sync = state.sync.clone();
    let sync_store = row.clone();
    tokio::spawn(async move {
        if let Err(e) = sync.full_sync(&sync_store).await {
            tracing::error!(
                merchant_id = %sync_store.merchant_id,
                error = %e,
                "Initial catalog sync failed"
            );
        }
    });

    tracing::info!(merchant_id = %row.merchant_id, store_url = %row.store_url, "Store connected");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "store": StoreDto::from(row),
            "webhooks": registration,
            "initial_sync": "started",
        })),
    ))
}

/// Re-verify the stored credentials against the store
pub async fn verify(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = resolve_merchant_unchecked(&state.pool, &headers).await?;
    if !row.is_active {
        return Err(ApiError::forbidden(
            "STORE_INACTIVE",
            "Store connection is disconnected",
        ));
    }

    let client = state.sync.client_for_store(&row).map_err(ApiError::from_sync)?;
    match client.verify_connection().await {
        Ok(info) => {
            store::mark_store_verified(
                &state.pool,
                row.id,
                info.wp_version.as_deref(),
                info.wc_version.as_deref(),
            )
            .await
            .map_err(ApiError::from_db)?;
            Ok(Json(serde_json::json!({
                "verified": true,
                "wp_version": info.wp_version,
                "wc_version": info.wc_version,
            })))
        }
        Err(e) => {
            tracing::warn!(merchant_id = %row.merchant_id, error = %e, "Verification failed");
            Ok(Json(serde_json::json!({
                "verified": false,
                "error": e.to_string(),
            })))
        }
    }
}

/// Current connection status
pub async fn status(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<StoreDto>, ApiError> {
    let row = resolve_merchant_unchecked(&state.pool, &headers).await?;
    Ok(Json(StoreDto::from(row)))
}

/// Disconnect the store: remove webhooks, deactivate the connection.
/// Mirrored product data is kept.
pub async fn disconnect(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = resolve_merchant_unchecked(&state.pool, &headers).await?;

    // Webhook removal is best-effort; the store may already be unreachable
    match state.sync.client_for_store(&row) {
        Ok(client) => {
            if let Err(e) = state.webhooks.delete_all(&row, &client).await {
                tracing::warn!(merchant_id = %row.merchant_id, error = %e, "Webhook cleanup failed");
            }
        }
        Err(e) => {
            tracing::warn!(merchant_id = %row.merchant_id, error = %e, "Skipping webhook cleanup");
        }
    }

    store::deactivate_store(&state.pool, row.id)
        .await
        .map_err(ApiError::from_db)?;

    tracing::info!(merchant_id = %row.merchant_id, "Store disconnected");
    Ok(Json(serde_json::json!({
        "disconnected": true,
        "data_retained": true,
    })))
}

/// Reconnect a disconnected store with fresh credentials
pub async fn reconnect(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<ReconnectRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = resolve_merchant_unchecked(&state.pool, &headers).await?;
    if body.consumer_key.is_empty() || body.consumer_secret.is_empty() {
        return Err(ApiError::bad_request(
            "MISSING_CREDENTIALS",
            "consumer_key and consumer_secret are required",
        ));
    }

    let client = WcClient::new(
        &row.store_url,
        &row.api_version,
        &body.consumer_key,
        &body.consumer_secret,
        state.config.woocommerce.request_timeout_secs,
    )
    .map_err(|_| ApiError::internal("Stored URL is no longer valid"))?;

    let info = client.verify_connection().await.map_err(|e| {
        tracing::warn!(merchant_id = %row.merchant_id, error = %e, "Reconnect verification failed");
        ApiError::bad_request(
            "VERIFICATION_FAILED",
            "Could not verify store credentials",
        )
    })?;

    let consumer_key = state
        .cipher
        .encrypt(&body.consumer_key)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let consumer_secret = state
        .cipher
        .encrypt(&body.consumer_secret)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let row = store::reconnect_store(&state.pool, row.id, &consumer_key, &consumer_secret)
        .await
        .map_err(ApiError::from_db)?;
    store::mark_store_verified(
        &state.pool,
        row.id,
        info.wp_version.as_deref(),
        info.wc_version.as_deref(),
    )
    .await
    .map_err(ApiError::from_db)?;

    let registration = state
        .webhooks
        .register_all(&row, &client)
        .await
        .map_err(ApiError::from_webhooks)?;

    // Catch up on changes missed while disconnected
    let sync = state.sync.clone();
    let sync_store = row.clone();
    tokio::spawn(async move {
        if let Err(e) = sync.full_sync(&sync_store).await {
            tracing::error!(
                merchant_id = %sync_store.merchant_id,
                error = %e,
                "Post-reconnect sync failed"
            );
        }
    });

    tracing::info!(merchant_id = %row.merchant_id, "Store reconnected");
    Ok(Json(serde_json::json!({
        "reconnected": true,
        "webhooks": registration,
        "sync": "started",
    })))
}
