//! Product read endpoints over the local mirror

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::auth::resolve_merchant;
use crate::api::state::ApiState;
use crate::api::types::{
    ApiError, PaginatedResponse, clamp_pagination, default_limit, default_page,
};
use crate::data::postgres::repositories::product;
use crate::data::postgres::repositories::product::ProductFilter;
use crate::data::types::ProductRow;

/// Build product routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/", get(list))
        .route("/{wc_product_id}", get(get_by_id))
        .route("/by-sku/{sku}", get(get_by_sku))
        .route("/search/semantic", post(semantic_search))
        .route("/stats/summary", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct SemanticSearchRequest {
    pub query: String,
    #[serde(default = "default_semantic_limit")]
    pub limit: u32,
}

fn default_semantic_limit() -> u32 {
    10
}

/// Product as returned in list responses. The raw provider payload is
/// only included on the detail endpoint.
#[derive(Debug, Serialize)]
pub struct ProductDto {
    pub wc_product_id: i64,
    pub name: String,
    pub slug: Option<String>,
    pub sku: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub status: Option<String>,
    pub price: Option<String>,
    pub regular_price: Option<String>,
    pub sale_price: Option<String>,
    pub categories: Option<serde_json::Value>,
    pub tags: Option<serde_json::Value>,
    pub has_embedding: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub wc_created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub wc_modified_at: Option<chrono::DateTime<chrono::Utc>>,
    pub synced_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ProductRow> for ProductDto {
    fn from(row: ProductRow) -> Self {
        Self {
            wc_product_id: row.wc_product_id,
            name: row.name,
            slug: row.slug,
            sku: row.sku,
            product_type: row.product_type,
            status: row.status,
            price: row.price,
            regular_price: row.regular_price,
            sale_price: row.sale_price,
            categories: row.categories,
            tags: row.tags,
            has_embedding: row.has_embedding,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            wc_created_at: row.wc_created_at,
            wc_modified_at: row.wc_modified_at,
            synced_at: row.synced_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetailDto {
    #[serde(flatten)]
    pub product: ProductDto,
    pub raw_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SemanticMatchDto {
    #[serde(flatten)]
    pub product: ProductDto,
    pub distance: f64,
}

/// GET /api/products - paginated listing with filters
pub async fn list(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedResponse<ProductDto>>, ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    let (page, limit) = clamp_pagination(query.page, query.limit);

    let filter = ProductFilter {
        status: query.status,
        product_type: query.product_type,
        search: query.search,
        include_deleted: query.include_deleted,
    };

    let (rows, total) = product::list_products(&state.pool, &store.merchant_id, &filter, page, limit)
        .await
        .map_err(ApiError::from_db)?;

    let data = rows.into_iter().map(ProductDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, page, limit, total)))
}

/// GET /api/products/{wc_product_id} - full product detail
pub async fn get_by_id(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(wc_product_id): Path<i64>,
) -> Result<Json<ProductDetailDto>, ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    let row = product::get_product_by_wc_id(&state.pool, &store.merchant_id, wc_product_id)
        .await
        .map_err(ApiError::from_db)?
        .ok_or_else(|| ApiError::not_found("PRODUCT_NOT_FOUND", "Product not found"))?;

    let raw_data = row.raw_data.clone();
    Ok(Json(ProductDetailDto {
        product: ProductDto::from(row),
        raw_data,
    }))
}

/// GET /api/products/by-sku/{sku} - lookup by SKU (live products only)
pub async fn get_by_sku(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(sku): Path<String>,
) -> Result<Json<ProductDetailDto>, ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    let row = product::get_product_by_sku(&state.pool, &store.merchant_id, &sku)
        .await
        .map_err(ApiError::from_db)?
        .ok_or_else(|| ApiError::not_found("PRODUCT_NOT_FOUND", "No product with that SKU"))?;

    let raw_data = row.raw_data.clone();
    Ok(Json(ProductDetailDto {
        product: ProductDto::from(row),
        raw_data,
    }))
}

/// POST /api/products/search/semantic - vector similarity search
pub async fn semantic_search(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<SemanticSearchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    if body.query.trim().is_empty() {
        return Err(ApiError::bad_request(
            "EMPTY_QUERY",
            "Search query must not be empty",
        ));
    }

    let Some(embeddings) = state.sync.embeddings() else {
        return Err(ApiError::bad_request(
            "EMBEDDINGS_DISABLED",
            "Semantic search is not enabled on this deployment",
        ));
    };

    let limit = body.limit.clamp(1, 50);
    let vector = embeddings.embed(body.query.trim()).await.map_err(|e| {
        tracing::warn!(error = %e, "Query embedding failed");
        ApiError::bad_gateway("EMBEDDING_FAILED", "Could not embed the search query")
    })?;

    let matches = product::semantic_search(&state.pool, &store.merchant_id, &vector, limit)
        .await
        .map_err(ApiError::from_db)?;

    let results: Vec<SemanticMatchDto> = matches
        .into_iter()
        .map(|(row, distance)| SemanticMatchDto {
            product: ProductDto::from(row),
            distance,
        })
        .collect();

    Ok(Json(serde_json::json!({
        "query": body.query,
        "count": results.len(),
        "results": results,
    })))
}

/// GET /api/products/stats/summary - mirror counts for the merchant
pub async fn stats(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = resolve_merchant(&state.pool, &headers).await?;
    let stats = product::product_stats(&state.pool, &store.merchant_id)
        .await
        .map_err(ApiError::from_db)?;

    Ok(Json(serde_json::json!({
        "total": stats.total,
        "live": stats.live,
        "deleted": stats.deleted,
        "with_embedding": stats.with_embedding,
        "by_status": stats.by_status,
        "by_type": stats.by_type,
        "last_synced_at": store.last_synced_at,
    })))
}
