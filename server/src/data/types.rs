//! Database row types shared across repositories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connected store row (`woocommerce_stores`)
///
/// `consumer_key` and `consumer_secret` hold encrypted envelopes, never
/// plaintext credentials.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreRow {
    pub id: i64,
    pub merchant_id: String,
    pub store_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub webhook_secret: Option<String>,
    pub api_version: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub wp_version: Option<String>,
    pub wc_version: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mirrored product row (`products`)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub store_id: i64,
    pub merchant_id: String,
    pub wc_product_id: i64,
    pub name: String,
    pub slug: Option<String>,
    pub sku: Option<String>,
    pub product_type: Option<String>,
    pub status: Option<String>,
    pub price: Option<String>,
    pub regular_price: Option<String>,
    pub sale_price: Option<String>,
    pub categories: Option<serde_json::Value>,
    pub tags: Option<serde_json::Value>,
    pub raw_data: Option<serde_json::Value>,
    pub search_text_hash: Option<String>,
    pub has_embedding: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub wc_created_at: Option<DateTime<Utc>>,
    pub wc_modified_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registered webhook subscription row (`webhooks`)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookRow {
    pub id: i64,
    pub store_id: i64,
    pub merchant_id: String,
    pub wc_webhook_id: i64,
    pub topic: String,
    pub delivery_url: String,
    pub secret: String,
    pub status: Option<String>,
    pub is_active: bool,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values extracted from a provider product payload, ready to upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub wc_product_id: i64,
    pub name: String,
    pub slug: Option<String>,
    pub sku: Option<String>,
    pub product_type: Option<String>,
    pub status: Option<String>,
    pub price: Option<String>,
    pub regular_price: Option<String>,
    pub sale_price: Option<String>,
    pub categories: serde_json::Value,
    pub tags: serde_json::Value,
    pub raw_data: serde_json::Value,
    pub search_text_hash: String,
    pub wc_created_at: Option<DateTime<Utc>>,
    pub wc_modified_at: Option<DateTime<Utc>>,
}

/// Per-status or per-type product count used by the stats summary
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductCount {
    pub key: String,
    pub count: i64,
}

/// Outcome of a single-row upsert, distinguishing insert from update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Skipped by the last-writer-wins guard (stale payload)
    Skipped,
}
