//! Shared API types
//!
//! Common types used across all API endpoints including error handling
//! and pagination.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Maximum items per page for paginated endpoints
pub const MAX_PAGE_LIMIT: u32 = 200;
/// Default page number
pub const DEFAULT_PAGE: u32 = 1;
/// Default items per page
pub const DEFAULT_LIMIT: u32 = 50;

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Unauthorized { code: String, message: String },
    Forbidden { code: String, message: String },
    Conflict { code: String, message: String },
    BadGateway { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Upstream store call failed
    pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadGateway {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn from_db(e: crate::data::PostgresError) -> Self {
        tracing::error!(error = %e, "Database error");
        Self::Internal {
            message: "Database operation failed".to_string(),
        }
    }

    pub fn from_sync(e: crate::domain::sync::SyncError) -> Self {
        use crate::domain::sync::SyncError;
        match e {
            SyncError::Database(db) => Self::from_db(db),
            SyncError::Provider(wc) => Self::from_provider(wc),
            SyncError::Credentials(msg) => {
                tracing::error!(error = %msg, "Credential error");
                Self::Internal {
                    message: "Stored credentials could not be decrypted".to_string(),
                }
            }
            SyncError::InvalidPayload(msg) => {
                Self::bad_request("INVALID_PAYLOAD", format!("Invalid product payload: {}", msg))
            }
        }
    }

    pub fn from_provider(e: crate::domain::wc::WcError) -> Self {
        use crate::domain::wc::WcError;
        match e {
            WcError::Unauthorized => Self::bad_gateway(
                "STORE_AUTH_FAILED",
                "Store rejected the API credentials",
            ),
            other => {
                tracing::warn!(error = %other, "Store request failed");
                Self::bad_gateway("STORE_UNREACHABLE", "Store request failed")
            }
        }
    }

    pub fn from_webhooks(e: crate::domain::webhooks::WebhookManagerError) -> Self {
        use crate::domain::webhooks::WebhookManagerError;
        match e {
            WebhookManagerError::Database(db) => Self::from_db(db),
            WebhookManagerError::Provider(wc) => Self::from_provider(wc),
            WebhookManagerError::MissingSecret => {
                Self::internal("Store has no webhook secret; reconnect the store")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", code, message)
            }
            Self::Forbidden { code, message } => {
                (StatusCode::FORBIDDEN, "forbidden", code, message)
            }
            Self::Conflict { code, message } => (StatusCode::CONFLICT, "conflict", code, message),
            Self::BadGateway { code, message } => {
                (StatusCode::BAD_GATEWAY, "bad_gateway", code, message)
            }
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

pub fn default_page() -> u32 {
    DEFAULT_PAGE
}

pub fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Clamp page/limit query values into their allowed ranges
pub fn clamp_pagination(page: u32, limit: u32) -> (u32, u32) {
    (page.max(1), limit.clamp(1, MAX_PAGE_LIMIT))
}

/// Pagination metadata in response
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            page,
            limit,
            total_items,
            total_pages: total_items.div_ceil(limit as u64),
        }
    }
}

/// Generic paginated response wrapper
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta::new(page, limit, total_items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(2, 50, 101);
        assert_eq!(meta.total_pages, 3);
        let meta = PaginationMeta::new(1, 50, 0);
        assert_eq!(meta.total_pages, 0);
    }

    #[test]
    fn test_clamp_pagination() {
        assert_eq!(clamp_pagination(0, 0), (1, 1));
        assert_eq!(clamp_pagination(3, 1000), (3, MAX_PAGE_LIMIT));
        assert_eq!(clamp_pagination(2, 25), (2, 25));
    }
}
