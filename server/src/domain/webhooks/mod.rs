//! Webhook subscription management
//!
//! Keeps the four product topics registered with each store and
//! reconciles local subscription rows with provider state.

pub mod verification;

use serde::Serialize;
use thiserror::Error;

use crate::data::postgres::repositories::webhook;
use crate::data::types::{StoreRow, WebhookRow};
use crate::data::{PgPool, PostgresError};
use crate::domain::wc::{WcClient, WcError, WcWebhook};

pub use verification::ProductEvent;

#[derive(Error, Debug)]
pub enum WebhookManagerError {
    #[error(transparent)]
    Database(#[from] PostgresError),

    #[error(transparent)]
    Provider(#[from] WcError),

    #[error("Store has no webhook secret")]
    MissingSecret,
}

/// Outcome of registering the product topics with a store
#[derive(Debug, Default, Clone, Serialize)]
pub struct RegistrationReport {
    pub created: Vec<String>,
    pub reused: Vec<String>,
    pub failed: Vec<String>,
}

/// Merged local/provider view of one subscription
#[derive(Debug, Clone, Serialize)]
pub struct WebhookView {
    pub wc_webhook_id: i64,
    pub topic: String,
    pub delivery_url: String,
    pub local_active: bool,
    pub provider_status: Option<String>,
    pub last_verified_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Outcome of a subscription sync against provider state
#[derive(Debug, Default, Clone, Serialize)]
pub struct WebhookSyncReport {
    pub live: u64,
    pub deactivated: u64,
}

/// Manages webhook subscriptions for connected stores
#[derive(Clone)]
pub struct WebhookManager {
    pool: PgPool,
    app_url: String,
}

impl WebhookManager {
    pub fn new(pool: PgPool, app_url: String) -> Self {
        Self { pool, app_url }
    }

    /// Delivery URL for an event, derived from the public base URL
    pub fn delivery_url(&self, event: ProductEvent) -> String {
        delivery_url_for(&self.app_url, event)
    }

    /// Ensure all four product topics are registered with the store.
    ///
    /// Topics already live at the provider with our delivery URL are
    /// reused; dropped ones are re-created. Per-topic failures are
    /// collected, not fatal.
    pub async fn register_all(
        &self,
        store: &StoreRow,
        client: &WcClient,
    ) -> Result<RegistrationReport, WebhookManagerError> {
        let secret = store
            .webhook_secret
            .as_deref()
            .ok_or(WebhookManagerError::MissingSecret)?;

        let existing = client.list_webhooks().await?;
        let mut report = RegistrationReport::default();

        for event in ProductEvent::ALL {
            let topic = event.topic();
            let delivery_url = self.delivery_url(event);

            let live = existing.iter().find(|w| {
                w.topic.as_deref() == Some(topic)
                    && w.delivery_url.as_deref() == Some(delivery_url.as_str())
                    && w.status.as_deref() == Some("active")
            });

            let result: Result<WcWebhook, WebhookManagerError> = match live {
                Some(w) => Ok(w.clone()),
                None => client
                    .create_webhook(topic, &delivery_url, secret)
                    .await
                    .map_err(Into::into),
            };

            match result {
                Ok(provider_webhook) => {
                    webhook::upsert_webhook(
                        &self.pool,
                        store.id,
                        &store.merchant_id,
                        provider_webhook.id,
                        topic,
                        &delivery_url,
                        secret,
                        provider_webhook.status.as_deref(),
                    )
                    .await?;
                    if live.is_some() {
                        report.reused.push(topic.to_string());
                    } else {
                        report.created.push(topic.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        merchant_id = %store.merchant_id,
                        topic,
                        error = %e,
                        "Webhook registration failed"
                    );
                    report.failed.push(topic.to_string());
                }
            }
        }

        tracing::info!(
            merchant_id = %store.merchant_id,
            created = report.created.len(),
            reused = report.reused.len(),
            failed = report.failed.len(),
            "Webhook registration complete"
        );
        Ok(report)
    }

    /// Merged local + provider view of the store's subscriptions
    pub async fn list(
        &self,
        store: &StoreRow,
        client: &WcClient,
    ) -> Result<Vec<WebhookView>, WebhookManagerError> {
        let local: Vec<WebhookRow> =
            webhook::list_webhooks_for_store(&self.pool, store.id, false).await?;
        let provider = client.list_webhooks().await.unwrap_or_else(|e| {
            tracing::warn!(merchant_id = %store.merchant_id, error = %e, "Provider webhook listing failed");
            Vec::new()
        });

        Ok(local
            .into_iter()
            .map(|row| {
                let provider_status = provider
                    .iter()
                    .find(|w| w.id == row.wc_webhook_id)
                    .and_then(|w| w.status.clone());
                WebhookView {
                    wc_webhook_id: row.wc_webhook_id,
                    topic: row.topic,
                    delivery_url: row.delivery_url,
                    local_active: row.is_active,
                    provider_status,
                    last_verified_at: row.last_verified_at,
                }
            })
            .collect())
    }

    /// Delete a subscription at the provider and deactivate it locally
    pub async fn delete(
        &self,
        store: &StoreRow,
        client: &WcClient,
        wc_webhook_id: i64,
    ) -> Result<bool, WebhookManagerError> {
        let removed_upstream = client.delete_webhook(wc_webhook_id).await?;
        let deactivated = webhook::deactivate_webhook(&self.pool, store.id, wc_webhook_id).await?;
        Ok(removed_upstream || deactivated)
    }

    /// Delete every subscription for a store (disconnect path).
    ///
    /// Provider-side failures are logged; local rows are always
    /// deactivated.
    pub async fn delete_all(
        &self,
        store: &StoreRow,
        client: &WcClient,
    ) -> Result<u64, WebhookManagerError> {
        let local = webhook::list_webhooks_for_store(&self.pool, store.id, true).await?;
        for row in &local {
            if let Err(e) = client.delete_webhook(row.wc_webhook_id).await {
                tracing::warn!(
                    merchant_id = %store.merchant_id,
                    wc_webhook_id = row.wc_webhook_id,
                    error = %e,
                    "Provider webhook deletion failed"
                );
            }
        }
        Ok(webhook::deactivate_all_for_store(&self.pool, store.id).await?)
    }

    /// Reconcile local rows with provider state: orphans (gone upstream)
    /// are deactivated, live ones get their verification timestamp bumped.
    pub async fn sync(
        &self,
        store: &StoreRow,
        client: &WcClient,
    ) -> Result<WebhookSyncReport, WebhookManagerError> {
        let provider = client.list_webhooks().await?;
        let live_ids: Vec<i64> = provider
            .iter()
            .filter(|w| w.status.as_deref() == Some("active"))
            .map(|w| w.id)
            .collect();

        webhook::mark_webhooks_verified(&self.pool, store.id, &live_ids).await?;
        let deactivated = webhook::deactivate_missing(&self.pool, store.id, &live_ids).await?;

        Ok(WebhookSyncReport {
            live: live_ids.len() as u64,
            deactivated,
        })
    }

    /// Record a successfully authenticated delivery for a topic
    pub async fn record_verified_delivery(
        &self,
        store: &StoreRow,
        event: ProductEvent,
    ) -> Result<(), WebhookManagerError> {
        webhook::mark_store_verified_delivery(&self.pool, store.id, event.topic()).await?;
        Ok(())
    }
}

fn delivery_url_for(app_url: &str, event: ProductEvent) -> String {
    format!("{}/api/webhooks/product/{}", app_url, event.path_segment())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_url() {
        assert_eq!(
            delivery_url_for("https://sync.example.com", ProductEvent::Created),
            "https://sync.example.com/api/webhooks/product/created"
        );
        assert_eq!(
            delivery_url_for("https://sync.example.com", ProductEvent::Restored),
            "https://sync.example.com/api/webhooks/product/restored"
        );
    }
}
