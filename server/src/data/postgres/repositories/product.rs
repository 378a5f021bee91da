//! Product repository for PostgreSQL operations
//!
//! The upsert is the write path for both webhook deliveries and catalog
//! sweeps; it is a single atomic statement so concurrent writers cannot
//! interleave a lost update.

use sqlx::{FromRow, PgPool, QueryBuilder, Row};

use crate::data::postgres::PostgresError;
use crate::data::types::{ProductCount, ProductRecord, ProductRow, UpsertOutcome};

// `embedding` is a pgvector column sqlx cannot decode; rows expose it as a
// presence flag instead.
const PRODUCT_COLUMNS: &str = "id, store_id, merchant_id, wc_product_id, name, slug, sku, \
     product_type, status, price, regular_price, sale_price, categories, tags, raw_data, \
     search_text_hash, (embedding IS NOT NULL) AS has_embedding, is_deleted, deleted_at, \
     wc_created_at, wc_modified_at, synced_at, created_at, updated_at";

/// Render an embedding as a pgvector text literal, e.g. `[0.1,0.2,0.3]`
pub fn vector_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 10 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{}", v));
    }
    out.push(']');
    out
}

/// Atomically insert or update a mirrored product.
///
/// Last-writer-wins by `wc_modified_at`: a payload older than the stored
/// row leaves it untouched and reports `Skipped`. A successful write
/// clears the soft-delete flags and never regresses `synced_at`. The
/// embedding is invalidated when the searchable text hash changes.
pub async fn upsert_product(
    pool: &PgPool,
    store_id: i64,
    merchant_id: &str,
    record: &ProductRecord,
) -> Result<UpsertOutcome, PostgresError> {
    let inserted: Option<bool> = sqlx::query_scalar(
        "INSERT INTO products \
             (store_id, merchant_id, wc_product_id, name, slug, sku, product_type, status, \
              price, regular_price, sale_price, categories, tags, raw_data, search_text_hash, \
              wc_created_at, wc_modified_at, synced_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, now()) \
         ON CONFLICT (wc_product_id) DO UPDATE SET \
             store_id = excluded.store_id, \
             merchant_id = excluded.merchant_id, \
             name = excluded.name, \
             slug = excluded.slug, \
             sku = excluded.sku, \
             product_type = excluded.product_type, \
             status = excluded.status, \
             price = excluded.price, \
             regular_price = excluded.regular_price, \
             sale_price = excluded.sale_price, \
             categories = excluded.categories, \
             tags = excluded.tags, \
             raw_data = excluded.raw_data, \
             embedding = CASE \
                 WHEN products.search_text_hash IS DISTINCT FROM excluded.search_text_hash \
                 THEN NULL ELSE products.embedding END, \
             search_text_hash = excluded.search_text_hash, \
             is_deleted = FALSE, \
             deleted_at = NULL, \
             wc_created_at = excluded.wc_created_at, \
             wc_modified_at = excluded.wc_modified_at, \
             synced_at = GREATEST(products.synced_at, excluded.synced_at), \
             updated_at = now() \
         WHERE products.wc_modified_at IS NULL \
            OR excluded.wc_modified_at IS NULL \
            OR excluded.wc_modified_at >= products.wc_modified_at \
         RETURNING (xmax = 0) AS inserted",
    )
    .bind(store_id)
    .bind(merchant_id)
    .bind(record.wc_product_id)
    .bind(&record.name)
    .bind(&record.slug)
    .bind(&record.sku)
    .bind(&record.product_type)
    .bind(&record.status)
    .bind(&record.price)
    .bind(&record.regular_price)
    .bind(&record.sale_price)
    .bind(&record.categories)
    .bind(&record.tags)
    .bind(&record.raw_data)
    .bind(&record.search_text_hash)
    .bind(record.wc_created_at)
    .bind(record.wc_modified_at)
    .fetch_optional(pool)
    .await?;

    Ok(match inserted {
        Some(true) => UpsertOutcome::Created,
        Some(false) => UpsertOutcome::Updated,
        None => UpsertOutcome::Skipped,
    })
}

/// Soft-delete a product. Idempotent; `deleted_at` is set once.
///
/// Returns false when no row matches (unknown product is not an error
/// on the delete path).
pub async fn soft_delete_product(
    pool: &PgPool,
    merchant_id: &str,
    wc_product_id: i64,
) -> Result<bool, PostgresError> {
    let result = sqlx::query(
        "UPDATE products \
         SET is_deleted = TRUE, deleted_at = COALESCE(deleted_at, now()), updated_at = now() \
         WHERE merchant_id = $1 AND wc_product_id = $2",
    )
    .bind(merchant_id)
    .bind(wc_product_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Clear the soft-delete flags on a restored product
pub async fn restore_product(
    pool: &PgPool,
    merchant_id: &str,
    wc_product_id: i64,
) -> Result<bool, PostgresError> {
    let result = sqlx::query(
        "UPDATE products \
         SET is_deleted = FALSE, deleted_at = NULL, updated_at = now() \
         WHERE merchant_id = $1 AND wc_product_id = $2",
    )
    .bind(merchant_id)
    .bind(wc_product_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Filters for the paginated product listing
#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub status: Option<String>,
    pub product_type: Option<String>,
    /// Case-insensitive substring match on name or SKU
    pub search: Option<String>,
    pub include_deleted: bool,
}

/// List products for a merchant with pagination, newest modifications first
pub async fn list_products(
    pool: &PgPool,
    merchant_id: &str,
    filter: &ProductFilter,
    page: u32,
    limit: u32,
) -> Result<(Vec<ProductRow>, u64), PostgresError> {
    let offset = (page.saturating_sub(1)) as i64 * limit as i64;

    let mut query = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE merchant_id = "));
    push_filters(&mut query, merchant_id, filter);
    query.push(" ORDER BY wc_modified_at DESC NULLS LAST, id DESC LIMIT ");
    query.push_bind(limit as i64);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let rows = query
        .build_query_as::<ProductRow>()
        .fetch_all(pool)
        .await?;

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE merchant_id = ");
    push_filters(&mut count_query, merchant_id, filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    Ok((rows, total as u64))
}

fn push_filters<'a>(
    query: &mut QueryBuilder<'a, sqlx::Postgres>,
    merchant_id: &'a str,
    filter: &'a ProductFilter,
) {
    query.push_bind(merchant_id);
    if !filter.include_deleted {
        query.push(" AND NOT is_deleted");
    }
    if let Some(status) = &filter.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
    if let Some(product_type) = &filter.product_type {
        query.push(" AND product_type = ");
        query.push_bind(product_type);
    }
    if let Some(search) = &filter.search {
        query.push(" AND (name ILIKE ");
        query.push_bind(format!("%{}%", search));
        query.push(" OR sku ILIKE ");
        query.push_bind(format!("%{}%", search));
        query.push(")");
    }
}

/// Get a product by its WooCommerce ID, scoped to a merchant
pub async fn get_product_by_wc_id(
    pool: &PgPool,
    merchant_id: &str,
    wc_product_id: i64,
) -> Result<Option<ProductRow>, PostgresError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE merchant_id = $1 AND wc_product_id = $2"
    ))
    .bind(merchant_id)
    .bind(wc_product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Get a live product by SKU, scoped to a merchant
pub async fn get_product_by_sku(
    pool: &PgPool,
    merchant_id: &str,
    sku: &str,
) -> Result<Option<ProductRow>, PostgresError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE merchant_id = $1 AND sku = $2 AND NOT is_deleted \
         ORDER BY id LIMIT 1"
    ))
    .bind(merchant_id)
    .bind(sku)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Aggregate product stats for a merchant
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProductStats {
    pub total: i64,
    pub live: i64,
    pub deleted: i64,
    pub with_embedding: i64,
    pub by_status: Vec<ProductCount>,
    pub by_type: Vec<ProductCount>,
}

pub async fn product_stats(
    pool: &PgPool,
    merchant_id: &str,
) -> Result<ProductStats, PostgresError> {
    let (total, live, deleted, with_embedding): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
                COUNT(*) FILTER (WHERE NOT is_deleted), \
                COUNT(*) FILTER (WHERE is_deleted), \
                COUNT(*) FILTER (WHERE embedding IS NOT NULL) \
         FROM products WHERE merchant_id = $1",
    )
    .bind(merchant_id)
    .fetch_one(pool)
    .await?;

    let by_status = sqlx::query_as::<_, ProductCount>(
        "SELECT COALESCE(status, 'unknown') AS key, COUNT(*) AS count \
         FROM products WHERE merchant_id = $1 AND NOT is_deleted \
         GROUP BY status ORDER BY count DESC",
    )
    .bind(merchant_id)
    .fetch_all(pool)
    .await?;

    let by_type = sqlx::query_as::<_, ProductCount>(
        "SELECT COALESCE(product_type, 'unknown') AS key, COUNT(*) AS count \
         FROM products WHERE merchant_id = $1 AND NOT is_deleted \
         GROUP BY product_type ORDER BY count DESC",
    )
    .bind(merchant_id)
    .fetch_all(pool)
    .await?;

    Ok(ProductStats {
        total,
        live,
        deleted,
        with_embedding,
        by_status,
        by_type,
    })
}

/// Nearest-neighbour search over product embeddings (L2 distance).
///
/// Only live rows with an embedding participate. Returns products with
/// their distance, closest first.
pub async fn semantic_search(
    pool: &PgPool,
    merchant_id: &str,
    query_embedding: &[f32],
    limit: u32,
) -> Result<Vec<(ProductRow, f64)>, PostgresError> {
    let literal = vector_literal(query_embedding);

    let rows = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS}, (embedding <-> $2::vector)::float8 AS distance \
         FROM products \
         WHERE merchant_id = $1 AND NOT is_deleted AND embedding IS NOT NULL \
         ORDER BY embedding <-> $2::vector \
         LIMIT $3"
    ))
    .bind(merchant_id)
    .bind(&literal)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let mut hits = Vec::with_capacity(rows.len());
    for row in rows {
        let product = ProductRow::from_row(&row)?;
        let distance: f64 = row.try_get("distance")?;
        hits.push((product, distance));
    }
    Ok(hits)
}

/// Store a freshly generated embedding together with the text hash it
/// was computed from
pub async fn set_product_embedding(
    pool: &PgPool,
    product_id: i64,
    embedding: &[f32],
    search_text_hash: &str,
) -> Result<(), PostgresError> {
    sqlx::query(
        "UPDATE products \
         SET embedding = $2::vector, search_text_hash = $3, updated_at = now() \
         WHERE id = $1",
    )
    .bind(product_id)
    .bind(vector_literal(embedding))
    .bind(search_text_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Candidate row for the embedding backfill pass
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmbeddingCandidate {
    pub id: i64,
    pub raw_data: Option<serde_json::Value>,
    pub search_text_hash: Option<String>,
}

/// Live products still missing an embedding, oldest first
pub async fn embedding_backfill_candidates(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<EmbeddingCandidate>, PostgresError> {
    let rows = sqlx::query_as::<_, EmbeddingCandidate>(
        "SELECT id, raw_data, search_text_hash FROM products \
         WHERE embedding IS NULL AND NOT is_deleted \
         ORDER BY id LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// All known (wc_product_id, is_deleted) pairs for a merchant.
///
/// Used by reconciliation to diff the mirror against the provider.
pub async fn list_product_ids(
    pool: &PgPool,
    merchant_id: &str,
) -> Result<Vec<(i64, bool)>, PostgresError> {
    let rows = sqlx::query_as::<_, (i64, bool)>(
        "SELECT wc_product_id, is_deleted FROM products WHERE merchant_id = $1",
    )
    .bind(merchant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Repository queries require a running PostgreSQL instance; only the
    // pure helpers are covered here.

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[]), "[]");
        assert_eq!(vector_literal(&[1.0]), "[1]");
        assert_eq!(vector_literal(&[0.5, -0.25, 2.0]), "[0.5,-0.25,2]");
    }

    #[test]
    fn test_vector_literal_roundtrip_precision() {
        let literal = vector_literal(&[0.123456789, 1e-10]);
        assert!(literal.starts_with('['));
        assert!(literal.ends_with(']'));
        assert_eq!(literal.matches(',').count(), 1);
    }
}
