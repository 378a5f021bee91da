//! Embedding generation via Vertex AI
//!
//! Produces fixed-size vectors from product text for semantic search.
//! Generation failures are always recoverable: the catalog row exists
//! without an embedding and the backfill task retries later.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::EmbeddingsConfig;
use crate::core::constants::{EMBEDDING_BACKFILL_BATCH, EMBEDDING_DIM, EMBEDDING_MODEL};
use crate::data::PgPool;
use crate::data::postgres::repositories::product;
use crate::domain::sync::prepare_product_text;
use crate::utils::crypto::sha256_hex;
use crate::utils::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, retry_with_backoff};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Idle delay between backfill passes when no candidates remain
const BACKFILL_IDLE_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vertex AI returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },

    #[error("Unexpected response shape: {0}")]
    InvalidResponse(String),

    #[error("Embedding has {got} dimensions, expected {expected}")]
    WrongDimension { got: usize, expected: usize },
}

impl EmbeddingError {
    fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Http(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Vertex AI text embedding client
pub struct EmbeddingService {
    http: reqwest::Client,
    token_provider: Arc<dyn gcp_auth::TokenProvider>,
    endpoint: String,
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl EmbeddingService {
    /// Build the service from configuration. Requires application-default
    /// GCP credentials in the environment.
    pub async fn init(config: &EmbeddingsConfig) -> Result<Self, EmbeddingError> {
        let project_id = config
            .gcp_project_id
            .as_deref()
            .ok_or_else(|| EmbeddingError::Auth("GCP project ID is not configured".to_string()))?;

        let token_provider = gcp_auth::provider()
            .await
            .map_err(|e| EmbeddingError::Auth(e.to_string()))?;

        let endpoint = format!(
            "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/google/models/{model}:predict",
            region = config.gcp_region,
            project = project_id,
            model = EMBEDDING_MODEL,
        );

        Ok(Self {
            http: reqwest::Client::new(),
            token_provider,
            endpoint,
        })
    }

    /// Generate an embedding for a text. The vector is validated to have
    /// exactly the dimension the schema declares.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = retry_with_backoff(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY_MS,
            EmbeddingError::is_transient,
            || self.embed_once(text),
        )
        .await?;

        if response.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::WrongDimension {
                got: response.len(),
                expected: EMBEDDING_DIM,
            });
        }
        Ok(response)
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let token = self
            .token_provider
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| EmbeddingError::Auth(e.to_string()))?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token.as_str())
            .json(&json!({ "instances": [{ "content": text }] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(512).collect();
            return Err(EmbeddingError::Status { status, body });
        }

        let data: serde_json::Value = response.json().await?;
        parse_prediction(&data)
    }
}

/// Pull the vector out of a Vertex AI predict response
fn parse_prediction(data: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    let values = data
        .get("predictions")
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("embeddings"))
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            EmbeddingError::InvalidResponse("missing predictions[0].embeddings.values".to_string())
        })?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbeddingError::InvalidResponse("non-numeric component".to_string()))
        })
        .collect()
}

/// Background task that fills missing embeddings for previously-synced
/// rows in batches
pub fn start_backfill_task(
    service: Arc<EmbeddingService>,
    pool: PgPool,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("Embedding backfill task started");
        loop {
            let candidates =
                match product::embedding_backfill_candidates(&pool, EMBEDDING_BACKFILL_BATCH).await
                {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(error = %e, "Backfill candidate query failed");
                        Vec::new()
                    }
                };

            let idle = candidates.is_empty();
            let mut filled = 0u64;

            for candidate in candidates {
                if *shutdown_rx.borrow() {
                    return;
                }
                let Some(raw) = candidate.raw_data else {
                    continue;
                };
                let text = prepare_product_text(&raw);
                if text.is_empty() {
                    continue;
                }
                let hash = candidate
                    .search_text_hash
                    .unwrap_or_else(|| sha256_hex(&text));

                match service.embed(&text).await {
                    Ok(vector) => {
                        if let Err(e) =
                            product::set_product_embedding(&pool, candidate.id, &vector, &hash)
                                .await
                        {
                            tracing::warn!(product_id = candidate.id, error = %e, "Failed to store embedding");
                        } else {
                            filled += 1;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(product_id = candidate.id, error = %e, "Backfill embedding failed");
                    }
                }
            }

            if filled > 0 {
                tracing::debug!(filled, "Embedding backfill pass complete");
            }

            let delay = if idle {
                Duration::from_secs(BACKFILL_IDLE_SECS)
            } else {
                Duration::from_secs(1)
            };
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!("Embedding backfill task shutting down");
                        return;
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_prediction() {
        let data = json!({
            "predictions": [{
                "embeddings": {
                    "values": [0.1, 0.2, -0.3],
                    "statistics": {"token_count": 5}
                }
            }]
        });
        let vector = parse_prediction(&data).unwrap();
        assert_eq!(vector.len(), 3);
        assert!((vector[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_parse_prediction_missing_fields() {
        assert!(parse_prediction(&json!({})).is_err());
        assert!(parse_prediction(&json!({"predictions": []})).is_err());
        assert!(
            parse_prediction(&json!({"predictions": [{"embeddings": {"values": ["x"]}}]})).is_err()
        );
    }
}
