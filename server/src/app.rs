//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG_LEVEL};
use crate::core::shutdown::ShutdownService;
use crate::data::PostgresService;
use crate::domain::embeddings::{self, EmbeddingService};
use crate::domain::scheduler::SchedulerService;
use crate::domain::sync::SyncService;
use crate::domain::webhooks::WebhookManager;
use crate::utils::crypto::CredentialCipher;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: Arc<AppConfig>,
    pub database: Arc<PostgresService>,
    pub cipher: CredentialCipher,
    pub sync: Arc<SyncService>,
    pub webhooks: WebhookManager,
    pub scheduler: Arc<SchedulerService>,
    pub embeddings: Option<Arc<EmbeddingService>>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = Arc::new(AppConfig::load(cli)?);

        let cipher = CredentialCipher::from_base64_key(&config.security.encryption_key)
            .context("Invalid ENCRYPTION_KEY")?;

        let database = Arc::new(
            PostgresService::init(&config.database)
                .await
                .context("Failed to initialize PostgreSQL")?,
        );

        let embeddings = if config.embeddings.enabled {
            let service = EmbeddingService::init(&config.embeddings)
                .await
                .context("Failed to initialize embedding service")?;
            tracing::info!("Embedding generation enabled");
            Some(Arc::new(service))
        } else {
            tracing::debug!("Embedding generation disabled");
            None
        };

        let sync = Arc::new(SyncService::new(
            database.pool().clone(),
            config.woocommerce.clone(),
            cipher.clone(),
            embeddings.clone(),
        ));
        let webhooks = WebhookManager::new(database.pool().clone(), config.app_url.clone());
        let scheduler = Arc::new(SchedulerService::new(config.scheduler.clone(), sync.clone()));
        let shutdown = ShutdownService::new(database.clone());

        Ok(Self {
            shutdown,
            config,
            database,
            cipher,
            sync,
            webhooks,
            scheduler,
            embeddings,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG_LEVEL)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        tracing::info!(
            environment = %app.config.environment,
            app_url = %app.config.app_url,
            scheduler = app.config.scheduler.enabled,
            embeddings = app.config.embeddings.enabled,
            "Startup complete"
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.database
                    .start_health_check_task(self.shutdown.subscribe()),
            )
            .await;

        if let Some(handle) = self.scheduler.start(self.shutdown.subscribe()) {
            self.shutdown.register(handle).await;
        }

        if let Some(service) = &self.embeddings {
            self.shutdown
                .register(embeddings::start_backfill_task(
                    service.clone(),
                    self.database.pool().clone(),
                    self.shutdown.subscribe(),
                ))
                .await;
        }

        tracing::debug!("Background tasks started");
    }
}
