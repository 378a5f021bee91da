//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::auth::require_api_key;
use super::middleware;
use super::routes::{connection, health, products, sync, webhooks};
use super::state::ApiState;
use crate::app::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let app = self.app;

        // Clone shutdown before moving state out of app
        let shutdown = app.shutdown.clone();

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(host.parse()?, port);

        let state = ApiState {
            config: app.config.clone(),
            pool: app.database.pool().clone(),
            sync: app.sync.clone(),
            webhooks: app.webhooks.clone(),
            scheduler: app.scheduler.clone(),
            cipher: app.cipher.clone(),
        };

        // Everything under /api except the delivery receiver requires the
        // deployment API key. Deliveries authenticate with the per-store
        // HMAC signature instead.
        let protected = Router::new()
            .nest("/api/connection", connection::routes())
            .nest("/api/products", products::routes())
            .nest("/api/webhooks", webhooks::routes())
            .nest("/api/sync", sync::routes())
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                require_api_key,
            ));

        let router = Router::new()
            .route("/", get(health::service_info))
            .route("/health", get(health::health))
            .route(
                "/api/webhooks/product/{event}",
                post(webhooks::receive_delivery),
            )
            .merge(protected)
            .fallback(middleware::handle_404)
            .layer(TraceLayer::new_for_http())
            .layer(middleware::cors())
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
            .with_state(state);

        tracing::info!(%addr, "API server listening");

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}
