//! Webhook subscription repository for PostgreSQL operations

use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::WebhookRow;

const WEBHOOK_COLUMNS: &str = "id, store_id, merchant_id, wc_webhook_id, topic, delivery_url, \
     secret, status, is_active, last_verified_at, created_at, updated_at";

/// Record a webhook registered with the provider.
///
/// Re-registering the same provider webhook reactivates the existing row
/// and refreshes its secret.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_webhook(
    pool: &PgPool,
    store_id: i64,
    merchant_id: &str,
    wc_webhook_id: i64,
    topic: &str,
    delivery_url: &str,
    secret: &str,
    status: Option<&str>,
) -> Result<WebhookRow, PostgresError> {
    let row = sqlx::query_as::<_, WebhookRow>(&format!(
        "INSERT INTO webhooks (store_id, merchant_id, wc_webhook_id, topic, delivery_url, secret, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (wc_webhook_id) DO UPDATE SET \
             store_id = excluded.store_id, \
             merchant_id = excluded.merchant_id, \
             topic = excluded.topic, \
             delivery_url = excluded.delivery_url, \
             secret = excluded.secret, \
             status = excluded.status, \
             is_active = TRUE, \
             updated_at = now() \
         RETURNING {WEBHOOK_COLUMNS}"
    ))
    .bind(store_id)
    .bind(merchant_id)
    .bind(wc_webhook_id)
    .bind(topic)
    .bind(delivery_url)
    .bind(secret)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// List webhooks for a store, optionally only active ones
pub async fn list_webhooks_for_store(
    pool: &PgPool,
    store_id: i64,
    active_only: bool,
) -> Result<Vec<WebhookRow>, PostgresError> {
    let sql = if active_only {
        format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
             WHERE store_id = $1 AND is_active ORDER BY id"
        )
    } else {
        format!("SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE store_id = $1 ORDER BY id")
    };

    let rows = sqlx::query_as::<_, WebhookRow>(&sql)
        .bind(store_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Deactivate a single webhook for a store
pub async fn deactivate_webhook(
    pool: &PgPool,
    store_id: i64,
    wc_webhook_id: i64,
) -> Result<bool, PostgresError> {
    let result = sqlx::query(
        "UPDATE webhooks SET is_active = FALSE, updated_at = now() \
         WHERE store_id = $1 AND wc_webhook_id = $2",
    )
    .bind(store_id)
    .bind(wc_webhook_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Deactivate every webhook for a store (disconnect path)
pub async fn deactivate_all_for_store(pool: &PgPool, store_id: i64) -> Result<u64, PostgresError> {
    let result = sqlx::query(
        "UPDATE webhooks SET is_active = FALSE, updated_at = now() WHERE store_id = $1",
    )
    .bind(store_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Bump `last_verified_at` for the given provider webhook IDs.
///
/// Called when a delivery authenticates or a provider listing confirms
/// the subscription is live.
pub async fn mark_webhooks_verified(
    pool: &PgPool,
    store_id: i64,
    wc_webhook_ids: &[i64],
) -> Result<(), PostgresError> {
    if wc_webhook_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "UPDATE webhooks SET last_verified_at = now(), updated_at = now() \
         WHERE store_id = $1 AND wc_webhook_id = ANY($2)",
    )
    .bind(store_id)
    .bind(wc_webhook_ids)
    .execute(pool)
    .await?;

    Ok(())
}

/// Bump `last_verified_at` for every active webhook of a store.
///
/// Used on an authenticated delivery, where the exact subscription is
/// identified by topic upstream.
pub async fn mark_store_verified_delivery(
    pool: &PgPool,
    store_id: i64,
    topic: &str,
) -> Result<(), PostgresError> {
    sqlx::query(
        "UPDATE webhooks SET last_verified_at = now(), updated_at = now() \
         WHERE store_id = $1 AND topic = $2 AND is_active",
    )
    .bind(store_id)
    .bind(topic)
    .execute(pool)
    .await?;

    Ok(())
}

/// Deactivate local rows whose provider webhook no longer exists
pub async fn deactivate_missing(
    pool: &PgPool,
    store_id: i64,
    live_wc_webhook_ids: &[i64],
) -> Result<u64, PostgresError> {
    let result = sqlx::query(
        "UPDATE webhooks SET is_active = FALSE, updated_at = now() \
         WHERE store_id = $1 AND is_active AND NOT (wc_webhook_id = ANY($2))",
    )
    .bind(store_id)
    .bind(live_wc_webhook_ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    // PostgreSQL tests require a running PostgreSQL instance
    // and are typically run as integration tests
}
