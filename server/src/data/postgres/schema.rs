//! PostgreSQL schema definitions

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL for PostgreSQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at BIGINT NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success BOOLEAN NOT NULL DEFAULT TRUE
);

-- Semantic search over product embeddings
CREATE EXTENSION IF NOT EXISTS vector;

-- =============================================================================
-- 1. Connected stores (credentials stored encrypted)
-- =============================================================================
CREATE TABLE IF NOT EXISTS woocommerce_stores (
    id BIGSERIAL PRIMARY KEY,
    merchant_id TEXT NOT NULL UNIQUE CHECK(length(merchant_id) >= 1),
    store_url TEXT NOT NULL UNIQUE CHECK(length(store_url) >= 1),
    consumer_key TEXT NOT NULL,
    consumer_secret TEXT NOT NULL,
    webhook_secret TEXT,
    api_version TEXT NOT NULL DEFAULT 'wc/v3',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    is_verified BOOLEAN NOT NULL DEFAULT FALSE,
    wp_version TEXT,
    wc_version TEXT,
    last_synced_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_stores_merchant ON woocommerce_stores(merchant_id);

-- =============================================================================
-- 2. Mirrored products (references stores)
-- =============================================================================
CREATE TABLE IF NOT EXISTS products (
    id BIGSERIAL PRIMARY KEY,
    store_id BIGINT NOT NULL REFERENCES woocommerce_stores(id) ON DELETE CASCADE,
    merchant_id TEXT NOT NULL,
    wc_product_id BIGINT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    slug TEXT,
    sku TEXT,
    product_type TEXT,
    status TEXT,
    price TEXT,
    regular_price TEXT,
    sale_price TEXT,
    categories JSONB,
    tags JSONB,
    raw_data JSONB,
    embedding vector(768),
    search_text_hash TEXT,
    is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
    deleted_at TIMESTAMPTZ,
    wc_created_at TIMESTAMPTZ,
    wc_modified_at TIMESTAMPTZ,
    synced_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (is_deleted = (deleted_at IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_products_store ON products(store_id);
CREATE INDEX IF NOT EXISTS idx_products_merchant ON products(merchant_id);
CREATE INDEX IF NOT EXISTS idx_products_sku ON products(merchant_id, sku);
CREATE INDEX IF NOT EXISTS idx_products_status ON products(merchant_id, status);
CREATE INDEX IF NOT EXISTS idx_products_deleted ON products(merchant_id, is_deleted);

-- =============================================================================
-- 3. Webhook subscriptions (references stores)
-- =============================================================================
CREATE TABLE IF NOT EXISTS webhooks (
    id BIGSERIAL PRIMARY KEY,
    store_id BIGINT NOT NULL REFERENCES woocommerce_stores(id) ON DELETE CASCADE,
    merchant_id TEXT NOT NULL,
    wc_webhook_id BIGINT NOT NULL UNIQUE,
    topic TEXT NOT NULL,
    delivery_url TEXT NOT NULL,
    secret TEXT NOT NULL,
    status TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    last_verified_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_webhooks_store ON webhooks(store_id);
CREATE INDEX IF NOT EXISTS idx_webhooks_merchant ON webhooks(merchant_id);
CREATE INDEX IF NOT EXISTS idx_webhooks_topic ON webhooks(store_id, topic);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_persists_connection_details() {
        let stores_ddl = SCHEMA
            .split("CREATE TABLE IF NOT EXISTS woocommerce_stores")
            .nth(1)
            .unwrap();
        assert!(stores_ddl.contains("api_version TEXT NOT NULL"));

        let webhooks_ddl = SCHEMA
            .split("CREATE TABLE IF NOT EXISTS webhooks")
            .nth(1)
            .unwrap();
        assert!(webhooks_ddl.contains("merchant_id TEXT NOT NULL"));
        assert!(webhooks_ddl.contains("secret TEXT NOT NULL"));
    }
}
