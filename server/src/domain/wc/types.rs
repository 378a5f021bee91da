//! WooCommerce REST API response types

use serde::{Deserialize, Serialize};

/// Store details extracted from the system status report
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreInfo {
    pub wp_version: Option<String>,
    pub wc_version: Option<String>,
}

/// One page of the product listing, with totals from the response headers
#[derive(Debug, Clone)]
pub struct ProductPage {
    /// Raw product payloads, preserved for `raw_data`
    pub products: Vec<serde_json::Value>,
    /// X-WP-Total
    pub total: u64,
    /// X-WP-TotalPages
    pub total_pages: u64,
}

/// Webhook subscription as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WcWebhook {
    pub id: i64,
    pub status: Option<String>,
    pub topic: Option<String>,
    pub delivery_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_deserializes_with_extra_fields() {
        let raw = serde_json::json!({
            "id": 42,
            "status": "active",
            "topic": "product.created",
            "delivery_url": "https://sync.example.com/api/webhooks/product/created",
            "secret": "ignored",
            "date_created": "2025-06-01T00:00:00"
        });
        let webhook: WcWebhook = serde_json::from_value(raw).unwrap();
        assert_eq!(webhook.id, 42);
        assert_eq!(webhook.status.as_deref(), Some("active"));
        assert_eq!(webhook.topic.as_deref(), Some("product.created"));
    }
}
