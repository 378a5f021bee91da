use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_GCP_REGION, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_RECONCILIATION_HOUR, DEFAULT_RECONCILIATION_MINUTE, DEFAULT_WEBHOOK_SECRET_LENGTH,
    POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
    POSTGRES_DEFAULT_MIN_CONNECTIONS, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
    WC_DEFAULT_API_VERSION, WC_DEFAULT_PRODUCTS_PER_PAGE, WC_DEFAULT_REQUEST_TIMEOUT_SECS,
    WC_MAX_PRODUCTS_PER_PAGE,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection DSN (or use DB_DSN env var)
    pub dsn: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// WooCommerce client configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct WooCommerceFileConfig {
    pub api_version: Option<String>,
    pub products_per_page: Option<u32>,
    pub request_timeout_secs: Option<u64>,
}

/// Webhook configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct WebhooksFileConfig {
    pub secret_length: Option<usize>,
}

/// Reconciliation scheduler configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SchedulerFileConfig {
    pub enabled: Option<bool>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
}

/// Embedding configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct EmbeddingsFileConfig {
    pub enabled: Option<bool>,
    pub gcp_project_id: Option<String>,
    pub gcp_region: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub database: Option<PostgresFileConfig>,
    pub woocommerce: Option<WooCommerceFileConfig>,
    pub webhooks: Option<WebhooksFileConfig>,
    pub scheduler: Option<SchedulerFileConfig>,
    pub embeddings: Option<EmbeddingsFileConfig>,
    pub app_url: Option<String>,
    pub environment: Option<String>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                current.host = server.host;
            }
            if server.port.is_some() {
                current.port = server.port;
            }
        }

        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(PostgresFileConfig::default);
            if database.dsn.is_some() {
                tracing::trace!(dsn = "***", "Merging database.dsn");
                current.dsn = database.dsn;
            }
            if database.max_connections.is_some() {
                current.max_connections = database.max_connections;
            }
            if database.min_connections.is_some() {
                current.min_connections = database.min_connections;
            }
            if database.acquire_timeout_secs.is_some() {
                current.acquire_timeout_secs = database.acquire_timeout_secs;
            }
            if database.idle_timeout_secs.is_some() {
                current.idle_timeout_secs = database.idle_timeout_secs;
            }
            if database.max_lifetime_secs.is_some() {
                current.max_lifetime_secs = database.max_lifetime_secs;
            }
            if database.statement_timeout_secs.is_some() {
                current.statement_timeout_secs = database.statement_timeout_secs;
            }
        }

        if let Some(wc) = other.woocommerce {
            let current = self
                .woocommerce
                .get_or_insert_with(WooCommerceFileConfig::default);
            if wc.api_version.is_some() {
                current.api_version = wc.api_version;
            }
            if wc.products_per_page.is_some() {
                current.products_per_page = wc.products_per_page;
            }
            if wc.request_timeout_secs.is_some() {
                current.request_timeout_secs = wc.request_timeout_secs;
            }
        }

        if let Some(webhooks) = other.webhooks {
            let current = self
                .webhooks
                .get_or_insert_with(WebhooksFileConfig::default);
            if webhooks.secret_length.is_some() {
                current.secret_length = webhooks.secret_length;
            }
        }

        if let Some(scheduler) = other.scheduler {
            let current = self
                .scheduler
                .get_or_insert_with(SchedulerFileConfig::default);
            if scheduler.enabled.is_some() {
                current.enabled = scheduler.enabled;
            }
            if scheduler.hour.is_some() {
                current.hour = scheduler.hour;
            }
            if scheduler.minute.is_some() {
                current.minute = scheduler.minute;
            }
        }

        if let Some(embeddings) = other.embeddings {
            let current = self
                .embeddings
                .get_or_insert_with(EmbeddingsFileConfig::default);
            if embeddings.enabled.is_some() {
                current.enabled = embeddings.enabled;
            }
            if embeddings.gcp_project_id.is_some() {
                current.gcp_project_id = embeddings.gcp_project_id;
            }
            if embeddings.gcp_region.is_some() {
                current.gcp_region = embeddings.gcp_region;
            }
        }

        if other.app_url.is_some() {
            self.app_url = other.app_url;
        }
        if other.environment.is_some() {
            self.environment = other.environment;
        }
        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// PostgreSQL connection DSN
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to keep warm
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
    /// Max connection lifetime in seconds
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// WooCommerce client configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct WooCommerceConfig {
    pub api_version: String,
    /// Page size for catalog sync, clamped to the provider maximum
    pub products_per_page: u32,
    pub request_timeout_secs: u64,
}

/// Webhook configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct WebhooksConfig {
    /// Random secret length in bytes
    pub secret_length: usize,
}

/// Reconciliation scheduler configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Daily run hour (UTC)
    pub hour: u32,
    pub minute: u32,
}

/// Embedding configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    pub enabled: bool,
    pub gcp_project_id: Option<String>,
    pub gcp_region: String,
}

/// Secrets that must come from CLI/env (never from the config file)
#[derive(Clone)]
pub struct SecurityConfig {
    /// API key expected in X-API-Key on protected routes
    pub api_key: String,
    /// Base64-encoded 32-byte key for credential encryption at rest
    pub encryption_key: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("api_key", &"***")
            .field("encryption_key", &"***")
            .finish()
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: PostgresConfig,
    pub woocommerce: WooCommerceConfig,
    pub webhooks: WebhooksConfig,
    pub scheduler: SchedulerConfig,
    pub embeddings: EmbeddingsConfig,
    pub security: SecurityConfig,
    /// Public base URL used to build webhook delivery URLs (no trailing slash)
    pub app_url: String,
    pub environment: String,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.wc-sync/wc-sync.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        // 3. Extract file config values with defaults
        let file_server = file_config.server.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();
        let file_wc = file_config.woocommerce.unwrap_or_default();
        let file_webhooks = file_config.webhooks.unwrap_or_default();
        let file_scheduler = file_config.scheduler.unwrap_or_default();
        let file_embeddings = file_config.embeddings.unwrap_or_default();

        // 4. Layer configs: defaults -> file config -> CLI/env overrides
        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let db_url = cli
            .db_dsn
            .clone()
            .or(file_database.dsn)
            .context("PostgreSQL DSN is required (set DB_DSN or database.dsn)")?;

        let database = PostgresConfig {
            url: db_url,
            max_connections: file_database
                .max_connections
                .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
            min_connections: file_database
                .min_connections
                .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
            acquire_timeout_secs: file_database
                .acquire_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout_secs: file_database
                .idle_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime_secs: file_database
                .max_lifetime_secs
                .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
            statement_timeout_secs: file_database
                .statement_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
        };

        let requested_per_page = cli
            .wc_products_per_page
            .or(file_wc.products_per_page)
            .unwrap_or(WC_DEFAULT_PRODUCTS_PER_PAGE);
        let products_per_page = if requested_per_page > WC_MAX_PRODUCTS_PER_PAGE {
            tracing::warn!(
                requested = requested_per_page,
                max = WC_MAX_PRODUCTS_PER_PAGE,
                "Clamping products_per_page to provider maximum"
            );
            WC_MAX_PRODUCTS_PER_PAGE
        } else {
            requested_per_page.max(1)
        };

        let woocommerce = WooCommerceConfig {
            api_version: cli
                .wc_api_version
                .clone()
                .or(file_wc.api_version)
                .unwrap_or_else(|| WC_DEFAULT_API_VERSION.to_string()),
            products_per_page,
            request_timeout_secs: cli
                .wc_request_timeout
                .or(file_wc.request_timeout_secs)
                .unwrap_or(WC_DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let webhooks = WebhooksConfig {
            secret_length: cli
                .webhook_secret_length
                .or(file_webhooks.secret_length)
                .unwrap_or(DEFAULT_WEBHOOK_SECRET_LENGTH),
        };

        let hour = cli
            .reconciliation_hour
            .or(file_scheduler.hour)
            .unwrap_or(DEFAULT_RECONCILIATION_HOUR);
        let minute = cli
            .reconciliation_minute
            .or(file_scheduler.minute)
            .unwrap_or(DEFAULT_RECONCILIATION_MINUTE);
        if hour > 23 {
            anyhow::bail!("Reconciliation hour must be 0-23, got {}", hour);
        }
        if minute > 59 {
            anyhow::bail!("Reconciliation minute must be 0-59, got {}", minute);
        }

        let scheduler = SchedulerConfig {
            enabled: cli
                .enable_scheduler
                .or(file_scheduler.enabled)
                .unwrap_or(true),
            hour,
            minute,
        };

        let embeddings_enabled = cli
            .enable_embeddings
            .or(file_embeddings.enabled)
            .unwrap_or(false);
        let gcp_project_id = cli
            .gcp_project_id
            .clone()
            .or(file_embeddings.gcp_project_id);
        if embeddings_enabled && gcp_project_id.is_none() {
            anyhow::bail!("GCP_PROJECT_ID is required when embeddings are enabled");
        }

        let embeddings = EmbeddingsConfig {
            enabled: embeddings_enabled,
            gcp_project_id,
            gcp_region: cli
                .gcp_region
                .clone()
                .or(file_embeddings.gcp_region)
                .unwrap_or_else(|| DEFAULT_GCP_REGION.to_string()),
        };

        let api_key = cli
            .api_key
            .clone()
            .context("API key is required (set API_KEY)")?;
        if api_key.is_empty() {
            anyhow::bail!("API key must not be empty");
        }

        let encryption_key = cli
            .encryption_key
            .clone()
            .context("Encryption key is required (set ENCRYPTION_KEY)")?;

        let app_url = cli
            .app_url
            .clone()
            .or(file_config.app_url)
            .context("Public base URL is required (set APP_URL)")?;
        let app_url = app_url.trim_end_matches('/').to_string();

        let environment = cli
            .environment
            .clone()
            .or(file_config.environment)
            .unwrap_or_else(|| "development".to_string());

        let debug = cli.debug || file_config.debug.unwrap_or(false);

        Ok(Self {
            server: ServerConfig { host, port },
            database,
            woocommerce,
            webhooks,
            scheduler,
            embeddings,
            security: SecurityConfig {
                api_key,
                encryption_key,
            },
            app_url,
            environment,
            debug,
        })
    }
}

/// Path to the profile config file (~/.wc-sync/wc-sync.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_cli() -> CliConfig {
        CliConfig {
            db_dsn: Some("postgres://localhost/wc_sync".to_string()),
            api_key: Some("test-key".to_string()),
            encryption_key: Some("dGVzdA==".to_string()),
            app_url: Some("https://sync.example.com/".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_defaults() {
        let config = AppConfig::load(&base_cli()).unwrap();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.woocommerce.api_version, "wc/v3");
        assert_eq!(config.woocommerce.products_per_page, 100);
        assert_eq!(config.scheduler.hour, 3);
        assert!(config.scheduler.enabled);
        assert!(!config.embeddings.enabled);
        // trailing slash stripped
        assert_eq!(config.app_url, "https://sync.example.com");
    }

    #[test]
    fn test_profile_config_path_shape() {
        if let Some(path) = get_profile_config_path() {
            assert!(path.ends_with(".wc-sync/wc-sync.json"));
        }
    }

    #[test]
    fn test_missing_required_values() {
        let mut cli = base_cli();
        cli.db_dsn = None;
        assert!(AppConfig::load(&cli).is_err());

        let mut cli = base_cli();
        cli.api_key = None;
        assert!(AppConfig::load(&cli).is_err());

        let mut cli = base_cli();
        cli.app_url = None;
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn test_per_page_clamped() {
        let mut cli = base_cli();
        cli.wc_products_per_page = Some(500);
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.woocommerce.products_per_page, 100);
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let mut cli = base_cli();
        cli.reconciliation_hour = Some(24);
        assert!(AppConfig::load(&cli).is_err());

        let mut cli = base_cli();
        cli.reconciliation_minute = Some(60);
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn test_embeddings_require_project() {
        let mut cli = base_cli();
        cli.enable_embeddings = Some(true);
        assert!(AppConfig::load(&cli).is_err());

        cli.gcp_project_id = Some("my-project".to_string());
        let config = AppConfig::load(&cli).unwrap();
        assert!(config.embeddings.enabled);
        assert_eq!(config.embeddings.gcp_region, "us-central1");
    }

    #[test]
    fn test_config_file_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wc-sync.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 9000}}, "scheduler": {{"hour": 5}}}}"#
        )
        .unwrap();

        let mut cli = base_cli();
        cli.config = Some(path);
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.scheduler.hour, 5);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wc-sync.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"server": {{"port": 9000}}}}"#).unwrap();

        let mut cli = base_cli();
        cli.config = Some(path);
        cli.port = Some(8100);
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 8100);
    }
}
