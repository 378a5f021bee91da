//! Application-wide constants and environment variable names

/// Application name
pub const APP_NAME: &str = "WooCommerce Sync";
/// Lowercase app name, used for the default log filter
pub const APP_NAME_LOWER: &str = "wc_sync";

/// Config file name searched in the working directory
pub const CONFIG_FILE_NAME: &str = "wc-sync.json";
/// Profile directory under the user's home
pub const APP_DOT_FOLDER: &str = ".wc-sync";

// -- Server defaults --

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8002;

/// Maximum JSON request body size (webhook payloads included)
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Graceful shutdown timeout for background tasks
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// -- PostgreSQL pool defaults --

pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

// -- WooCommerce defaults --

/// Default WooCommerce REST API version
pub const WC_DEFAULT_API_VERSION: &str = "wc/v3";
/// Default page size for catalog sync
pub const WC_DEFAULT_PRODUCTS_PER_PAGE: u32 = 100;
/// Hard upper bound enforced by the WooCommerce API
pub const WC_MAX_PRODUCTS_PER_PAGE: u32 = 100;
/// Default request timeout against merchant stores, seconds
pub const WC_DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Delay between catalog pages during a full sync
pub const SYNC_PAGE_DELAY_MS: u64 = 500;

// -- Scheduler defaults --

pub const DEFAULT_RECONCILIATION_HOUR: u32 = 3;
pub const DEFAULT_RECONCILIATION_MINUTE: u32 = 0;

// -- Webhooks --

/// Default random secret length in bytes (url-safe base64 encoded)
pub const DEFAULT_WEBHOOK_SECRET_LENGTH: usize = 32;

// -- Embeddings --

/// Vertex AI embedding model
pub const EMBEDDING_MODEL: &str = "text-embedding-004";
/// Fixed embedding dimension; the pgvector column is declared with this
pub const EMBEDDING_DIM: usize = 768;
/// Maximum description length fed into the embedding text
pub const EMBEDDING_MAX_DESCRIPTION_CHARS: usize = 500;
/// Batch size for the embedding backfill pass
pub const EMBEDDING_BACKFILL_BATCH: i64 = 50;
/// Default GCP region for Vertex AI
pub const DEFAULT_GCP_REGION: &str = "us-central1";

// -- Environment variable names --

pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";
pub const ENV_DEBUG: &str = "DEBUG";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_APP_HOST: &str = "APP_HOST";
pub const ENV_APP_PORT: &str = "APP_PORT";
pub const ENV_APP_URL: &str = "APP_URL";
pub const ENV_DB_DSN: &str = "DB_DSN";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";
pub const ENV_ENABLE_SCHEDULER: &str = "ENABLE_SCHEDULER";
pub const ENV_RECONCILIATION_HOUR: &str = "RECONCILIATION_HOUR";
pub const ENV_RECONCILIATION_MINUTE: &str = "RECONCILIATION_MINUTE";
pub const ENV_WC_API_VERSION: &str = "WC_API_VERSION";
pub const ENV_WC_PRODUCTS_PER_PAGE: &str = "WC_PRODUCTS_PER_PAGE";
pub const ENV_WC_REQUEST_TIMEOUT: &str = "WC_REQUEST_TIMEOUT";
pub const ENV_WEBHOOK_SECRET_LENGTH: &str = "WEBHOOK_SECRET_LENGTH";
pub const ENV_ENABLE_EMBEDDINGS: &str = "ENABLE_EMBEDDINGS";
pub const ENV_GCP_PROJECT_ID: &str = "GCP_PROJECT_ID";
pub const ENV_GCP_REGION: &str = "GCP_REGION";
pub const ENV_CONFIG: &str = "WC_SYNC_CONFIG";
