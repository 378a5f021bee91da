use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_API_KEY, ENV_APP_HOST, ENV_APP_PORT, ENV_APP_URL, ENV_CONFIG, ENV_DB_DSN, ENV_DEBUG,
    ENV_ENABLE_EMBEDDINGS, ENV_ENABLE_SCHEDULER, ENV_ENCRYPTION_KEY, ENV_ENVIRONMENT,
    ENV_GCP_PROJECT_ID, ENV_GCP_REGION, ENV_RECONCILIATION_HOUR, ENV_RECONCILIATION_MINUTE,
    ENV_WC_API_VERSION, ENV_WC_PRODUCTS_PER_PAGE, ENV_WC_REQUEST_TIMEOUT,
    ENV_WEBHOOK_SECRET_LENGTH,
};

#[derive(Parser)]
#[command(name = "wc-sync")]
#[command(version, about = "WooCommerce product catalog sync service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_APP_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_APP_PORT)]
    pub port: Option<u16>,

    /// Deployment environment name (development, staging, production)
    #[arg(long, global = true, env = ENV_ENVIRONMENT)]
    pub environment: Option<String>,

    /// Enable debug mode (verbose request logging)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Public base URL used to build webhook delivery URLs
    #[arg(long, global = true, env = ENV_APP_URL)]
    pub app_url: Option<String>,

    /// PostgreSQL connection DSN
    #[arg(long, global = true, env = ENV_DB_DSN)]
    pub db_dsn: Option<String>,

    /// API key required on protected routes (X-API-Key header)
    #[arg(long, global = true, env = ENV_API_KEY, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base64-encoded 32-byte key for credential encryption at rest
    #[arg(long, global = true, env = ENV_ENCRYPTION_KEY, hide_env_values = true)]
    pub encryption_key: Option<String>,

    // Scheduler options
    /// Enable the daily reconciliation scheduler
    #[arg(long, global = true, env = ENV_ENABLE_SCHEDULER)]
    pub enable_scheduler: Option<bool>,

    /// Reconciliation hour (UTC, 0-23)
    #[arg(long, global = true, env = ENV_RECONCILIATION_HOUR)]
    pub reconciliation_hour: Option<u32>,

    /// Reconciliation minute (0-59)
    #[arg(long, global = true, env = ENV_RECONCILIATION_MINUTE)]
    pub reconciliation_minute: Option<u32>,

    // WooCommerce client options
    /// WooCommerce REST API version (e.g. wc/v3)
    #[arg(long, global = true, env = ENV_WC_API_VERSION)]
    pub wc_api_version: Option<String>,

    /// Page size for catalog sync (max 100)
    #[arg(long, global = true, env = ENV_WC_PRODUCTS_PER_PAGE)]
    pub wc_products_per_page: Option<u32>,

    /// Request timeout against merchant stores, seconds
    #[arg(long, global = true, env = ENV_WC_REQUEST_TIMEOUT)]
    pub wc_request_timeout: Option<u64>,

    /// Random webhook secret length in bytes
    #[arg(long, global = true, env = ENV_WEBHOOK_SECRET_LENGTH)]
    pub webhook_secret_length: Option<usize>,

    // Embedding options
    /// Enable embedding generation for semantic search
    #[arg(long, global = true, env = ENV_ENABLE_EMBEDDINGS)]
    pub enable_embeddings: Option<bool>,

    /// GCP project ID for Vertex AI
    #[arg(long, global = true, env = ENV_GCP_PROJECT_ID)]
    pub gcp_project_id: Option<String>,

    /// GCP region for Vertex AI
    #[arg(long, global = true, env = ENV_GCP_REGION)]
    pub gcp_region: Option<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub environment: Option<String>,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub app_url: Option<String>,
    pub db_dsn: Option<String>,
    pub api_key: Option<String>,
    pub encryption_key: Option<String>,
    pub enable_scheduler: Option<bool>,
    pub reconciliation_hour: Option<u32>,
    pub reconciliation_minute: Option<u32>,
    pub wc_api_version: Option<String>,
    pub wc_products_per_page: Option<u32>,
    pub wc_request_timeout: Option<u64>,
    pub webhook_secret_length: Option<usize>,
    pub enable_embeddings: Option<bool>,
    pub gcp_project_id: Option<String>,
    pub gcp_region: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        environment: cli.environment,
        debug: cli.debug,
        config: cli.config,
        app_url: cli.app_url,
        db_dsn: cli.db_dsn,
        api_key: cli.api_key,
        encryption_key: cli.encryption_key,
        enable_scheduler: cli.enable_scheduler,
        reconciliation_hour: cli.reconciliation_hour,
        reconciliation_minute: cli.reconciliation_minute,
        wc_api_version: cli.wc_api_version,
        wc_products_per_page: cli.wc_products_per_page,
        wc_request_timeout: cli.wc_request_timeout,
        webhook_secret_length: cli.webhook_secret_length,
        enable_embeddings: cli.enable_embeddings,
        gcp_project_id: cli.gcp_project_id,
        gcp_region: cli.gcp_region,
    };
    (config, cli.command)
}
