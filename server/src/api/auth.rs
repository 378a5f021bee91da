//! Request authentication
//!
//! Protected routes require `X-API-Key`. Merchant-scoped routes
//! additionally resolve the calling store from `X-Merchant-Id`.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::state::ApiState;
use crate::api::types::ApiError;
use crate::data::PgPool;
use crate::data::postgres::repositories::store;
use crate::data::types::StoreRow;
use crate::utils::crypto::constant_time_eq;

pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_MERCHANT_ID: &str = "x-merchant-id";

/// Validate the API key header. 401 when missing, 403 when wrong.
pub fn check_api_key(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let provided = headers
        .get(HEADER_API_KEY)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("API_KEY_MISSING", "X-API-Key header is required"))?;

    if !constant_time_eq(provided, expected) {
        return Err(ApiError::forbidden("API_KEY_INVALID", "Invalid API key"));
    }
    Ok(())
}

/// Middleware enforcing the API key on everything behind it
pub async fn require_api_key(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_api_key(request.headers(), &state.config.security.api_key)?;
    Ok(next.run(request).await)
}

/// Resolve the store for a merchant-scoped request.
///
/// 400 when the header is missing, 404 for an unknown merchant, 403 for
/// an inactive or unverified store.
pub async fn resolve_merchant(pool: &PgPool, headers: &HeaderMap) -> Result<StoreRow, ApiError> {
    let merchant_id = headers
        .get(HEADER_MERCHANT_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::bad_request("MERCHANT_ID_MISSING", "X-Merchant-Id header is required")
        })?;

    let row = store::get_store_by_merchant(pool, merchant_id)
        .await
        .map_err(ApiError::from_db)?
        .ok_or_else(|| {
            ApiError::not_found("STORE_NOT_FOUND", "No store connected for this merchant")
        })?;

    if !row.is_active {
        return Err(ApiError::forbidden(
            "STORE_INACTIVE",
            "Store connection is disconnected",
        ));
    }
    if !row.is_verified {
        return Err(ApiError::forbidden(
            "STORE_UNVERIFIED",
            "Store credentials have not been verified",
        ));
    }
    Ok(row)
}

/// Resolve the store without the active/verified checks.
///
/// Used by connection management routes that operate on disconnected or
/// not-yet-verified stores.
pub async fn resolve_merchant_unchecked(
    pool: &PgPool,
    headers: &HeaderMap,
) -> Result<StoreRow, ApiError> {
    let merchant_id = headers
        .get(HEADER_MERCHANT_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::bad_request("MERCHANT_ID_MISSING", "X-Merchant-Id header is required")
        })?;

    store::get_store_by_merchant(pool, merchant_id)
        .await
        .map_err(ApiError::from_db)?
        .ok_or_else(|| {
            ApiError::not_found("STORE_NOT_FOUND", "No store connected for this merchant")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_check_api_key() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            check_api_key(&headers, "secret"),
            Err(ApiError::Unauthorized { .. })
        ));

        headers.insert(HEADER_API_KEY, HeaderValue::from_static("wrong"));
        assert!(matches!(
            check_api_key(&headers, "secret"),
            Err(ApiError::Forbidden { .. })
        ));

        headers.insert(HEADER_API_KEY, HeaderValue::from_static("secret"));
        assert!(check_api_key(&headers, "secret").is_ok());
    }
}
