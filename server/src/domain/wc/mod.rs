//! WooCommerce REST API client
//!
//! Authenticates with consumer key/secret over Basic Auth. All requests go
//! to `{store_url}/wp-json/{api_version}`. List endpoints surface the
//! `X-WP-Total` and `X-WP-TotalPages` headers for pagination.

pub mod types;

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::core::constants::WC_MAX_PRODUCTS_PER_PAGE;
use crate::utils::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, retry_with_backoff};

pub use types::{ProductPage, StoreInfo, WcWebhook};

#[derive(Error, Debug)]
pub enum WcError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Credentials rejected by store")]
    Unauthorized,

    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl WcError {
    /// Transient errors are worth retrying: timeouts, connection failures,
    /// and 5xx responses. Auth and 4xx failures are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            WcError::Http(e) => e.is_timeout() || e.is_connect(),
            WcError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// Client for one store's WooCommerce REST API
#[derive(Clone)]
pub struct WcClient {
    http: reqwest::Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl std::fmt::Debug for WcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WcClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WcClient {
    pub fn new(
        store_url: &str,
        api_version: &str,
        consumer_key: &str,
        consumer_secret: &str,
        timeout_secs: u64,
    ) -> Result<Self, WcError> {
        let store_url = store_url.trim_end_matches('/');
        if !store_url.starts_with("http://") && !store_url.starts_with("https://") {
            return Err(WcError::InvalidUrl(store_url.to_string()));
        }
        if store_url.starts_with("http://") {
            tracing::warn!(url = %store_url, "Store URL is not HTTPS; credentials travel in the clear");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/wp-json/{}", store_url, api_version.trim_matches('/')),
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, WcError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(WcError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(512).collect();
            return Err(WcError::Status { status, body });
        }
        Ok(response)
    }

    fn header_u64(response: &reqwest::Response, name: &str) -> u64 {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Verify credentials against the system status report and extract the
    /// platform versions
    pub async fn verify_connection(&self) -> Result<StoreInfo, WcError> {
        let url = self.url("system_status");
        let response = retry_with_backoff(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY_MS,
            WcError::is_transient,
            || async {
                let resp = self
                    .http
                    .get(&url)
                    .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
                    .send()
                    .await?;
                Self::check(resp).await
            },
        )
        .await?;

        let data: serde_json::Value = response.json().await?;
        let environment = data.get("environment").cloned().unwrap_or(json!({}));

        Ok(StoreInfo {
            wp_version: environment
                .get("wp_version")
                .and_then(|v| v.as_str())
                .map(String::from),
            // WooCommerce reports its own version as environment.version
            wc_version: environment
                .get("version")
                .and_then(|v| v.as_str())
                .map(String::from),
        })
    }

    /// Fetch one page of products. `per_page` is clamped to the provider
    /// maximum of 100.
    pub async fn list_products(&self, page: u32, per_page: u32) -> Result<ProductPage, WcError> {
        let per_page = per_page.clamp(1, WC_MAX_PRODUCTS_PER_PAGE);
        let url = self.url("products");

        let response = retry_with_backoff(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY_MS,
            WcError::is_transient,
            || async {
                let resp = self
                    .http
                    .get(&url)
                    .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
                    .query(&[("page", page.max(1)), ("per_page", per_page)])
                    .send()
                    .await?;
                Self::check(resp).await
            },
        )
        .await?;

        let total = Self::header_u64(&response, "X-WP-Total");
        let total_pages = Self::header_u64(&response, "X-WP-TotalPages");

        let products: Vec<serde_json::Value> = response.json().await?;
        Ok(ProductPage {
            products,
            total,
            total_pages,
        })
    }

    /// Fetch a single product by its WooCommerce ID. Returns None on 404.
    pub async fn get_product(&self, wc_product_id: i64) -> Result<Option<serde_json::Value>, WcError> {
        let url = self.url(&format!("products/{}", wc_product_id));
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(response.json().await?))
    }

    /// Register a webhook subscription with the store
    pub async fn create_webhook(
        &self,
        topic: &str,
        delivery_url: &str,
        secret: &str,
    ) -> Result<WcWebhook, WcError> {
        let url = self.url("webhooks");
        let body = json!({
            "name": format!("Product sync ({})", topic),
            "topic": topic,
            "delivery_url": delivery_url,
            "secret": secret,
            "status": "active",
        });

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let webhook: WcWebhook = response
            .json()
            .await
            .map_err(|e| WcError::InvalidResponse(e.to_string()))?;
        Ok(webhook)
    }

    /// List all webhook subscriptions registered with the store
    pub async fn list_webhooks(&self) -> Result<Vec<WcWebhook>, WcError> {
        let url = self.url("webhooks");
        let mut all = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .http
                .get(&url)
                .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
                .query(&[("page", page), ("per_page", WC_MAX_PRODUCTS_PER_PAGE)])
                .send()
                .await?;
            let response = Self::check(response).await?;
            let total_pages = Self::header_u64(&response, "X-WP-TotalPages");

            let batch: Vec<WcWebhook> = response.json().await?;
            let empty = batch.is_empty();
            all.extend(batch);

            if empty || (total_pages > 0 && page as u64 >= total_pages) {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Delete a webhook subscription. Returns false on 404.
    pub async fn delete_webhook(&self, wc_webhook_id: i64) -> Result<bool, WcError> {
        let url = self.url(&format!("webhooks/{}", wc_webhook_id));
        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .query(&[("force", "true")])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let client = WcClient::new("https://shop.example.com/", "wc/v3", "ck", "cs", 30).unwrap();
        assert_eq!(client.url("products"), "https://shop.example.com/wp-json/wc/v3/products");
        assert_eq!(
            client.url("/webhooks"),
            "https://shop.example.com/wp-json/wc/v3/webhooks"
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            WcClient::new("ftp://shop.example.com", "wc/v3", "ck", "cs", 30),
            Err(WcError::InvalidUrl(_))
        ));
        assert!(matches!(
            WcClient::new("shop.example.com", "wc/v3", "ck", "cs", 30),
            Err(WcError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        let err = WcError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert!(err.is_transient());

        let err = WcError::Status {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: String::new(),
        };
        assert!(!err.is_transient());

        assert!(!WcError::Unauthorized.is_transient());
    }
}
