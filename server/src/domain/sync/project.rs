//! Projection of raw WooCommerce product payloads into mirror rows

use serde_json::Value;

use crate::core::constants::EMBEDDING_MAX_DESCRIPTION_CHARS;
use crate::data::types::ProductRecord;
use crate::utils::crypto::sha256_hex;
use crate::utils::time::parse_provider_timestamp;

/// Extract the columns we mirror from a raw product payload.
///
/// The full payload is preserved in `raw_data`; everything else is a
/// convenience projection for queries.
pub fn project_product(payload: &Value) -> Result<ProductRecord, String> {
    let wc_product_id = payload
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| "missing numeric 'id'".to_string())?;

    let name = str_field(payload, "name").unwrap_or_else(|| format!("Product {}", wc_product_id));

    let wc_created_at = str_field(payload, "date_created_gmt")
        .or_else(|| str_field(payload, "date_created"))
        .and_then(|s| parse_provider_timestamp(&s));
    let wc_modified_at = str_field(payload, "date_modified_gmt")
        .or_else(|| str_field(payload, "date_modified"))
        .and_then(|s| parse_provider_timestamp(&s));

    Ok(ProductRecord {
        wc_product_id,
        name,
        slug: str_field(payload, "slug"),
        sku: str_field(payload, "sku"),
        product_type: str_field(payload, "type"),
        status: str_field(payload, "status"),
        price: str_field(payload, "price"),
        regular_price: str_field(payload, "regular_price"),
        sale_price: str_field(payload, "sale_price"),
        categories: payload
            .get("categories")
            .cloned()
            .unwrap_or_else(|| Value::Array(vec![])),
        tags: payload
            .get("tags")
            .cloned()
            .unwrap_or_else(|| Value::Array(vec![])),
        raw_data: payload.clone(),
        search_text_hash: sha256_hex(&prepare_product_text(payload)),
        wc_created_at,
        wc_modified_at,
    })
}

/// Non-empty string field, if present
fn str_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Build the searchable text an embedding is computed from.
///
/// Field order is part of the contract: changing it changes every hash
/// and forces an embedding rebuild.
pub fn prepare_product_text(payload: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(name) = str_field(payload, "name") {
        parts.push(name);
    }

    if let Some(description) = str_field(payload, "description") {
        let stripped = strip_html(&description);
        if !stripped.is_empty() {
            parts.push(stripped.chars().take(EMBEDDING_MAX_DESCRIPTION_CHARS).collect());
        }
    }

    if let Some(short) = str_field(payload, "short_description") {
        let stripped = strip_html(&short);
        if !stripped.is_empty() {
            parts.push(stripped);
        }
    }

    if let Some(names) = collect_names(payload.get("categories")) {
        parts.push(format!("Categories: {}", names));
    }
    if let Some(names) = collect_names(payload.get("tags")) {
        parts.push(format!("Tags: {}", names));
    }

    if let Some(sku) = str_field(payload, "sku") {
        parts.push(format!("SKU: {}", sku));
    }

    if let Some(Value::Array(attributes)) = payload.get("attributes") {
        for attr in attributes {
            let Some(name) = attr.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            let options: Vec<&str> = attr
                .get("options")
                .and_then(|v| v.as_array())
                .map(|opts| opts.iter().filter_map(|o| o.as_str()).collect())
                .unwrap_or_default();
            if !options.is_empty() {
                parts.push(format!("{}: {}", name, options.join(", ")));
            }
        }
    }

    parts.join(" | ")
}

/// Comma-joined `name` fields from an array of term objects
fn collect_names(value: Option<&Value>) -> Option<String> {
    let names: Vec<&str> = value?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("name").and_then(|n| n.as_str()))
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

/// Strip HTML tags and collapse whitespace
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    let decoded = out
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&nbsp;", " ");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "id": 123,
            "name": "Wool Hiking Socks",
            "slug": "wool-hiking-socks",
            "sku": "SOCK-W-42",
            "type": "simple",
            "status": "publish",
            "price": "14.99",
            "regular_price": "19.99",
            "sale_price": "14.99",
            "description": "<p>Warm &amp; durable socks.</p>",
            "short_description": "<strong>Merino wool.</strong>",
            "categories": [{"id": 1, "name": "Apparel"}, {"id": 2, "name": "Outdoor"}],
            "tags": [{"id": 9, "name": "winter"}],
            "attributes": [{"name": "Size", "options": ["40", "42", "44"]}],
            "date_created_gmt": "2025-05-01T09:00:00",
            "date_modified_gmt": "2025-06-15T10:30:00"
        })
    }

    #[test]
    fn test_project_product() {
        let record = project_product(&sample_payload()).unwrap();
        assert_eq!(record.wc_product_id, 123);
        assert_eq!(record.name, "Wool Hiking Socks");
        assert_eq!(record.sku.as_deref(), Some("SOCK-W-42"));
        assert_eq!(record.product_type.as_deref(), Some("simple"));
        assert_eq!(record.status.as_deref(), Some("publish"));
        assert_eq!(record.price.as_deref(), Some("14.99"));
        assert_eq!(record.categories.as_array().unwrap().len(), 2);
        assert!(record.wc_created_at.is_some());
        assert!(record.wc_modified_at.unwrap() > record.wc_created_at.unwrap());
        assert_eq!(record.raw_data, sample_payload());
        assert_eq!(record.search_text_hash.len(), 64);
    }

    #[test]
    fn test_project_requires_id() {
        assert!(project_product(&json!({"name": "No ID"})).is_err());
        assert!(project_product(&json!({"id": "123"})).is_err());
    }

    #[test]
    fn test_project_minimal_payload() {
        let record = project_product(&json!({"id": 7})).unwrap();
        assert_eq!(record.name, "Product 7");
        assert!(record.sku.is_none());
        assert_eq!(record.categories, json!([]));
        assert!(record.wc_modified_at.is_none());
    }

    #[test]
    fn test_empty_strings_become_none() {
        let record = project_product(&json!({"id": 7, "sku": "", "sale_price": ""})).unwrap();
        assert!(record.sku.is_none());
        assert!(record.sale_price.is_none());
    }

    #[test]
    fn test_prepare_product_text() {
        let text = prepare_product_text(&sample_payload());
        assert_eq!(
            text,
            "Wool Hiking Socks | Warm & durable socks. | Merino wool. | \
             Categories: Apparel, Outdoor | Tags: winter | SKU: SOCK-W-42 | Size: 40, 42, 44"
        );
    }

    #[test]
    fn test_prepare_text_caps_description() {
        let long = "x".repeat(2000);
        let payload = json!({"id": 1, "name": "N", "description": long});
        let text = prepare_product_text(&payload);
        assert_eq!(text.len(), "N | ".len() + EMBEDDING_MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_hash_stable_under_irrelevant_changes() {
        let a = project_product(&sample_payload()).unwrap();
        let mut altered = sample_payload();
        altered["price"] = json!("9.99");
        let b = project_product(&altered).unwrap();
        assert_eq!(a.search_text_hash, b.search_text_hash);

        let mut renamed = sample_payload();
        renamed["name"] = json!("Different Name");
        let c = project_product(&renamed).unwrap();
        assert_ne!(a.search_text_hash, c.search_text_hash);
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_html("plain text"), "plain text");
        assert_eq!(strip_html("a &amp; b"), "a & b");
        assert_eq!(strip_html("<br/><br/>"), "");
        assert_eq!(strip_html("multi\n  line\ttext"), "multi line text");
    }
}
