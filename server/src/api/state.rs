//! Shared state for API handlers

use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::data::PgPool;
use crate::domain::scheduler::SchedulerService;
use crate::domain::sync::SyncService;
use crate::domain::webhooks::WebhookManager;
use crate::utils::crypto::CredentialCipher;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub sync: Arc<SyncService>,
    pub webhooks: WebhookManager,
    pub scheduler: Arc<SchedulerService>,
    pub cipher: CredentialCipher,
}
