//! Service info and health endpoints (public)

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::api::state::ApiState;
use crate::core::constants::APP_NAME;

/// GET / - basic service info
pub async fn service_info(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}

/// GET /health - liveness plus a database round trip
pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<serde_json::Value>) {
    let database_up = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let status = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if database_up { "ok" } else { "degraded" },
            "database": if database_up { "up" } else { "down" },
        })),
    )
}
