//! Store repository for PostgreSQL operations

use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::StoreRow;

const STORE_COLUMNS: &str = "id, merchant_id, store_url, consumer_key, consumer_secret, \
     webhook_secret, api_version, is_active, is_verified, wp_version, wc_version, \
     last_synced_at, created_at, updated_at";

/// Create a new store connection
///
/// `consumer_key` and `consumer_secret` must already be encrypted envelopes.
/// Fails with a unique violation when the merchant or store URL is already
/// connected.
pub async fn create_store(
    pool: &PgPool,
    merchant_id: &str,
    store_url: &str,
    consumer_key: &str,
    consumer_secret: &str,
    webhook_secret: &str,
    api_version: &str,
) -> Result<StoreRow, PostgresError> {
    let row = sqlx::query_as::<_, StoreRow>(&format!(
        "INSERT INTO woocommerce_stores \
             (merchant_id, store_url, consumer_key, consumer_secret, webhook_secret, api_version) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {STORE_COLUMNS}"
    ))
    .bind(merchant_id)
    .bind(store_url)
    .bind(consumer_key)
    .bind(consumer_secret)
    .bind(webhook_secret)
    .bind(api_version)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Get a store by merchant ID
pub async fn get_store_by_merchant(
    pool: &PgPool,
    merchant_id: &str,
) -> Result<Option<StoreRow>, PostgresError> {
    let row = sqlx::query_as::<_, StoreRow>(&format!(
        "SELECT {STORE_COLUMNS} FROM woocommerce_stores WHERE merchant_id = $1"
    ))
    .bind(merchant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Get a store by its URL (exact match on the normalized URL)
pub async fn get_store_by_url(
    pool: &PgPool,
    store_url: &str,
) -> Result<Option<StoreRow>, PostgresError> {
    let row = sqlx::query_as::<_, StoreRow>(&format!(
        "SELECT {STORE_COLUMNS} FROM woocommerce_stores WHERE store_url = $1"
    ))
    .bind(store_url)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List all stores eligible for reconciliation (active and verified)
pub async fn list_active_verified_stores(pool: &PgPool) -> Result<Vec<StoreRow>, PostgresError> {
    let rows = sqlx::query_as::<_, StoreRow>(&format!(
        "SELECT {STORE_COLUMNS} FROM woocommerce_stores \
         WHERE is_active AND is_verified ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Mark a store as verified and record the reported platform versions
pub async fn mark_store_verified(
    pool: &PgPool,
    store_id: i64,
    wp_version: Option<&str>,
    wc_version: Option<&str>,
) -> Result<(), PostgresError> {
    sqlx::query(
        "UPDATE woocommerce_stores \
         SET is_verified = TRUE, wp_version = $2, wc_version = $3, updated_at = now() \
         WHERE id = $1",
    )
    .bind(store_id)
    .bind(wp_version)
    .bind(wc_version)
    .execute(pool)
    .await?;

    Ok(())
}

/// Deactivate a store (disconnect). Mirrored data is kept.
pub async fn deactivate_store(pool: &PgPool, store_id: i64) -> Result<(), PostgresError> {
    sqlx::query(
        "UPDATE woocommerce_stores \
         SET is_active = FALSE, is_verified = FALSE, updated_at = now() \
         WHERE id = $1",
    )
    .bind(store_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Reactivate a store with fresh credentials (reconnect)
pub async fn reconnect_store(
    pool: &PgPool,
    store_id: i64,
    consumer_key: &str,
    consumer_secret: &str,
) -> Result<StoreRow, PostgresError> {
    let row = sqlx::query_as::<_, StoreRow>(&format!(
        "UPDATE woocommerce_stores \
         SET consumer_key = $2, consumer_secret = $3, is_active = TRUE, updated_at = now() \
         WHERE id = $1 \
         RETURNING {STORE_COLUMNS}"
    ))
    .bind(store_id)
    .bind(consumer_key)
    .bind(consumer_secret)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Bump `last_synced_at` after a completed catalog sync
pub async fn touch_last_synced(pool: &PgPool, store_id: i64) -> Result<(), PostgresError> {
    sqlx::query(
        "UPDATE woocommerce_stores SET last_synced_at = now(), updated_at = now() WHERE id = $1",
    )
    .bind(store_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    // PostgreSQL tests require a running PostgreSQL instance
    // and are typically run as integration tests
}
