//! Inbound webhook delivery verification
//!
//! WooCommerce signs the raw request body with the per-store secret:
//! `X-WC-Webhook-Signature: base64(HMAC-SHA256(body, secret))`.

use axum::http::HeaderMap;

use crate::utils::crypto::verify_webhook_signature;

pub const HEADER_SIGNATURE: &str = "x-wc-webhook-signature";
pub const HEADER_SOURCE: &str = "x-wc-webhook-source";
pub const HEADER_TOPIC: &str = "x-wc-webhook-topic";
pub const HEADER_RESOURCE: &str = "x-wc-webhook-resource";
pub const HEADER_EVENT: &str = "x-wc-webhook-event";

/// Product webhook events we subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductEvent {
    Created,
    Updated,
    Deleted,
    Restored,
}

impl ProductEvent {
    pub const ALL: [ProductEvent; 4] = [
        ProductEvent::Created,
        ProductEvent::Updated,
        ProductEvent::Deleted,
        ProductEvent::Restored,
    ];

    /// Provider topic string, e.g. `product.created`
    pub fn topic(&self) -> &'static str {
        match self {
            ProductEvent::Created => "product.created",
            ProductEvent::Updated => "product.updated",
            ProductEvent::Deleted => "product.deleted",
            ProductEvent::Restored => "product.restored",
        }
    }

    /// URL path segment of the delivery endpoint
    pub fn path_segment(&self) -> &'static str {
        match self {
            ProductEvent::Created => "created",
            ProductEvent::Updated => "updated",
            ProductEvent::Deleted => "deleted",
            ProductEvent::Restored => "restored",
        }
    }

    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "product.created" => Some(ProductEvent::Created),
            "product.updated" => Some(ProductEvent::Updated),
            "product.deleted" => Some(ProductEvent::Deleted),
            "product.restored" => Some(ProductEvent::Restored),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.topic())
    }
}

/// Check a delivery signature against the store secret (constant time)
pub fn verify_delivery(headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
    let Some(signature) = header_str(headers, HEADER_SIGNATURE) else {
        return false;
    };
    verify_webhook_signature(body, secret, signature)
}

/// Source store URL of a delivery, normalized without trailing slash
pub fn delivery_source(headers: &HeaderMap) -> Option<String> {
    header_str(headers, HEADER_SOURCE).map(|s| s.trim_end_matches('/').to_string())
}

/// Resolve the event from the topic header, falling back to the
/// resource + event header pair
pub fn delivery_event(headers: &HeaderMap) -> Option<ProductEvent> {
    if let Some(topic) = header_str(headers, HEADER_TOPIC)
        && let Some(event) = ProductEvent::from_topic(topic)
    {
        return Some(event);
    }

    let resource = header_str(headers, HEADER_RESOURCE)?;
    let event = header_str(headers, HEADER_EVENT)?;
    if resource != "product" {
        return None;
    }
    ProductEvent::from_topic(&format!("product.{}", event))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::sign_webhook_payload;
    use axum::http::HeaderValue;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_verify_delivery() {
        let body = br#"{"id":1}"#;
        let sig = sign_webhook_payload(body, "secret");
        let headers = headers_with(&[(HEADER_SIGNATURE, &sig)]);
        assert!(verify_delivery(&headers, body, "secret"));
        assert!(!verify_delivery(&headers, body, "wrong"));
        assert!(!verify_delivery(&headers, b"other body", "secret"));
    }

    #[test]
    fn test_verify_delivery_missing_signature() {
        let headers = HeaderMap::new();
        assert!(!verify_delivery(&headers, b"{}", "secret"));
    }

    #[test]
    fn test_delivery_source_normalized() {
        let headers = headers_with(&[(HEADER_SOURCE, "https://shop.example.com/")]);
        assert_eq!(
            delivery_source(&headers).as_deref(),
            Some("https://shop.example.com")
        );
    }

    #[test]
    fn test_delivery_event_from_topic() {
        let headers = headers_with(&[(HEADER_TOPIC, "product.updated")]);
        assert_eq!(delivery_event(&headers), Some(ProductEvent::Updated));
    }

    #[test]
    fn test_delivery_event_from_resource_pair() {
        let headers = headers_with(&[(HEADER_RESOURCE, "product"), (HEADER_EVENT, "deleted")]);
        assert_eq!(delivery_event(&headers), Some(ProductEvent::Deleted));

        let headers = headers_with(&[(HEADER_RESOURCE, "order"), (HEADER_EVENT, "created")]);
        assert_eq!(delivery_event(&headers), None);
    }

    #[test]
    fn test_event_roundtrip() {
        for event in ProductEvent::ALL {
            assert_eq!(ProductEvent::from_topic(event.topic()), Some(event));
        }
        assert_eq!(ProductEvent::from_topic("order.created"), None);
    }
}
