//! HTTP middleware (CORS, 404 handler)

use axum::extract::Request;
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{Any, CorsLayer};

const HEADER_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const HEADER_MERCHANT_ID: HeaderName = HeaderName::from_static("x-merchant-id");

/// Create CORS layer.
///
/// The API is consumed by backend integrations and merchant dashboards
/// on arbitrary origins; access control is the API key, not the origin.
pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HEADER_API_KEY,
            HEADER_MERCHANT_ID,
        ])
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!("[404] {} {}", req.method(), req.uri());
    StatusCode::NOT_FOUND
}
