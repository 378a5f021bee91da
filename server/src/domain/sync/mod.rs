//! Product mirror writer
//!
//! Translates raw WooCommerce payloads into rows and keeps the local
//! mirror consistent through webhook deliveries, full catalog syncs, and
//! the reconciliation sweep.

mod project;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::core::config::WooCommerceConfig;
use crate::core::constants::SYNC_PAGE_DELAY_MS;
use crate::data::postgres::repositories::{product, store};
use crate::data::types::{ProductRow, StoreRow, UpsertOutcome};
use crate::data::{PgPool, PostgresError};
use crate::domain::embeddings::EmbeddingService;
use crate::domain::wc::{WcClient, WcError};
use crate::utils::crypto::CredentialCipher;

pub use project::{prepare_product_text, project_product, strip_html};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Database(#[from] PostgresError),

    #[error(transparent)]
    Provider(#[from] WcError),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Invalid product payload: {0}")]
    InvalidPayload(String),
}

/// Result of a full catalog sync
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    pub total_reported: u64,
    pub pages: u32,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Result of a reconciliation sweep
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileReport {
    pub provider_products: u64,
    pub upserted: u64,
    pub soft_deleted: u64,
    pub failed: u64,
}

/// Orchestrates writes into the product mirror for one deployment
#[derive(Clone)]
pub struct SyncService {
    pool: PgPool,
    wc_config: WooCommerceConfig,
    cipher: CredentialCipher,
    embeddings: Option<Arc<EmbeddingService>>,
}

impl SyncService {
    pub fn new(
        pool: PgPool,
        wc_config: WooCommerceConfig,
        cipher: CredentialCipher,
        embeddings: Option<Arc<EmbeddingService>>,
    ) -> Self {
        Self {
            pool,
            wc_config,
            cipher,
            embeddings,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn embeddings(&self) -> Option<&Arc<EmbeddingService>> {
        self.embeddings.as_ref()
    }

    /// Build an API client for a store, decrypting its credentials
    pub fn client_for_store(&self, store: &StoreRow) -> Result<WcClient, SyncError> {
        let consumer_key = self
            .cipher
            .decrypt(&store.consumer_key)
            .map_err(|e| SyncError::Credentials(e.to_string()))?;
        let consumer_secret = self
            .cipher
            .decrypt(&store.consumer_secret)
            .map_err(|e| SyncError::Credentials(e.to_string()))?;

        Ok(WcClient::new(
            &store.store_url,
            &store.api_version,
            &consumer_key,
            &consumer_secret,
            self.wc_config.request_timeout_secs,
        )?)
    }

    /// Apply one product payload to the mirror (webhook or sweep path).
    ///
    /// Idempotent: re-delivery of the same payload is a no-op thanks to
    /// the modified-timestamp guard in the upsert.
    pub async fn apply_product_payload(
        &self,
        store: &StoreRow,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, SyncError> {
        let record = project_product(payload).map_err(SyncError::InvalidPayload)?;
        let outcome =
            product::upsert_product(&self.pool, store.id, &store.merchant_id, &record).await?;

        tracing::debug!(
            merchant_id = %store.merchant_id,
            wc_product_id = record.wc_product_id,
            outcome = ?outcome,
            "Applied product payload"
        );

        // Embedding generation never blocks the catalog write. The upsert
        // nulls the stored embedding when the searchable text changed, so
        // a row that still has one needs no regeneration.
        if outcome != UpsertOutcome::Skipped
            && let Some(embeddings) = &self.embeddings
            && let Some(row) =
                product::get_product_by_wc_id(&self.pool, &store.merchant_id, record.wc_product_id)
                    .await?
            && embedding_stale(&row, &record.search_text_hash)
        {
            let text = prepare_product_text(payload);
            match embeddings.embed(&text).await {
                Ok(vector) => {
                    product::set_product_embedding(
                        &self.pool,
                        row.id,
                        &vector,
                        &record.search_text_hash,
                    )
                    .await?;
                }
                Err(e) => {
                    tracing::warn!(
                        wc_product_id = record.wc_product_id,
                        error = %e,
                        "Embedding generation failed; product synced without embedding"
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// Soft-delete a product from a provider deletion event
    pub async fn delete_product(
        &self,
        store: &StoreRow,
        wc_product_id: i64,
    ) -> Result<bool, SyncError> {
        let deleted =
            product::soft_delete_product(&self.pool, &store.merchant_id, wc_product_id).await?;
        tracing::debug!(
            merchant_id = %store.merchant_id,
            wc_product_id,
            deleted,
            "Soft-deleted product"
        );
        Ok(deleted)
    }

    /// Restore a product from a provider restore event.
    ///
    /// When the row is unknown locally, fetches the product from the
    /// provider and mirrors it fresh.
    pub async fn restore_product(
        &self,
        store: &StoreRow,
        wc_product_id: i64,
    ) -> Result<bool, SyncError> {
        let restored =
            product::restore_product(&self.pool, &store.merchant_id, wc_product_id).await?;
        if restored {
            return Ok(true);
        }

        let client = self.client_for_store(store)?;
        if let Some(payload) = client.get_product(wc_product_id).await? {
            self.apply_product_payload(store, &payload).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Mirror the full catalog with offset pagination.
    ///
    /// Individual payload failures are counted, not fatal; a page fetch
    /// failure aborts the sync.
    pub async fn full_sync(&self, store: &StoreRow) -> Result<SyncReport, SyncError> {
        let client = self.client_for_store(store)?;
        let per_page = self.wc_config.products_per_page;
        let mut report = SyncReport::default();
        let mut page = 1u32;

        loop {
            let batch = client.list_products(page, per_page).await?;
            report.total_reported = batch.total;
            report.pages = page;

            if batch.products.is_empty() {
                break;
            }

            for payload in &batch.products {
                match self.apply_product_payload(store, payload).await {
                    Ok(UpsertOutcome::Created) => report.created += 1,
                    Ok(UpsertOutcome::Updated) => report.updated += 1,
                    Ok(UpsertOutcome::Skipped) => report.skipped += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            merchant_id = %store.merchant_id,
                            page,
                            error = %e,
                            "Failed to sync product payload"
                        );
                    }
                }
            }

            if batch.total_pages > 0 && page as u64 >= batch.total_pages {
                break;
            }
            page += 1;
            tokio::time::sleep(Duration::from_millis(SYNC_PAGE_DELAY_MS)).await;
        }

        store::touch_last_synced(&self.pool, store.id).await?;
        tracing::info!(
            merchant_id = %store.merchant_id,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            pages = report.pages,
            "Catalog sync complete"
        );
        Ok(report)
    }

    /// Diff the mirror against the provider catalog.
    ///
    /// Upserts products that are missing or marked deleted locally, and
    /// soft-deletes local rows the provider no longer has.
    pub async fn reconcile(&self, store: &StoreRow) -> Result<ReconcileReport, SyncError> {
        let client = self.client_for_store(store)?;
        let per_page = self.wc_config.products_per_page;
        let mut report = ReconcileReport::default();

        let local: Vec<(i64, bool)> =
            product::list_product_ids(&self.pool, &store.merchant_id).await?;
        let local_live: HashSet<i64> = local
            .iter()
            .filter(|(_, deleted)| !deleted)
            .map(|(id, _)| *id)
            .collect();
        let local_deleted: HashSet<i64> = local
            .iter()
            .filter(|(_, deleted)| *deleted)
            .map(|(id, _)| *id)
            .collect();

        let mut upstream: HashSet<i64> = HashSet::new();
        let mut page = 1u32;
        loop {
            let batch = client.list_products(page, per_page).await?;
            report.provider_products = batch.total;
            if batch.products.is_empty() {
                break;
            }

            for payload in &batch.products {
                let Some(id) = payload.get("id").and_then(|v| v.as_i64()) else {
                    continue;
                };
                upstream.insert(id);

                // Re-mirror anything we don't hold live; existing live rows
                // go through the upsert too so drift in fields heals.
                match self.apply_product_payload(store, payload).await {
                    Ok(UpsertOutcome::Skipped) => {}
                    Ok(_) => {
                        if !local_live.contains(&id) || local_deleted.contains(&id) {
                            report.upserted += 1;
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            merchant_id = %store.merchant_id,
                            wc_product_id = id,
                            error = %e,
                            "Reconciliation upsert failed"
                        );
                    }
                }
            }

            if batch.total_pages > 0 && page as u64 >= batch.total_pages {
                break;
            }
            page += 1;
            tokio::time::sleep(Duration::from_millis(SYNC_PAGE_DELAY_MS)).await;
        }

        // Local rows absent upstream are soft-deleted
        for id in local_live.difference(&upstream) {
            match product::soft_delete_product(&self.pool, &store.merchant_id, *id).await {
                Ok(true) => report.soft_deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        merchant_id = %store.merchant_id,
                        wc_product_id = id,
                        error = %e,
                        "Reconciliation soft-delete failed"
                    );
                }
            }
        }

        store::touch_last_synced(&self.pool, store.id).await?;
        tracing::info!(
            merchant_id = %store.merchant_id,
            upserted = report.upserted,
            soft_deleted = report.soft_deleted,
            failed = report.failed,
            "Reconciliation complete"
        );
        Ok(report)
    }
}

/// A row needs a fresh embedding when none is stored or the searchable
/// text changed since the stored one was computed
fn embedding_stale(row: &ProductRow, search_text_hash: &str) -> bool {
    !row.has_embedding || row.search_text_hash.as_deref() != Some(search_text_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product_row(has_embedding: bool, search_text_hash: Option<&str>) -> ProductRow {
        ProductRow {
            id: 1,
            store_id: 1,
            merchant_id: "m1".to_string(),
            wc_product_id: 42,
            name: "Widget".to_string(),
            slug: None,
            sku: None,
            product_type: None,
            status: None,
            price: None,
            regular_price: None,
            sale_price: None,
            categories: None,
            tags: None,
            raw_data: None,
            search_text_hash: search_text_hash.map(String::from),
            has_embedding,
            is_deleted: false,
            deleted_at: None,
            wc_created_at: None,
            wc_modified_at: None,
            synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_embedding_kept_when_text_unchanged() {
        let row = product_row(true, Some("abc"));
        assert!(!embedding_stale(&row, "abc"));
    }

    #[test]
    fn test_embedding_regenerated_when_text_changed() {
        let row = product_row(true, Some("abc"));
        assert!(embedding_stale(&row, "def"));
    }

    #[test]
    fn test_embedding_generated_when_missing() {
        assert!(embedding_stale(&product_row(false, Some("abc")), "abc"));
        assert!(embedding_stale(&product_row(false, None), "abc"));
    }
}
