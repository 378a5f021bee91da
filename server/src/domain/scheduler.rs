//! Daily reconciliation scheduler
//!
//! Fires once a day at the configured UTC time and reconciles every
//! active, verified store. Per-store failures never stop the sweep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::core::config::SchedulerConfig;
use crate::data::postgres::repositories::store;
use crate::domain::sync::SyncService;
use crate::utils::time::next_daily_run;

/// Scheduler state exposed through the API
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
    pub running: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}

/// Per-store outcome of a reconciliation sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepEntry {
    pub merchant_id: String,
    pub ok: bool,
    pub upserted: u64,
    pub soft_deleted: u64,
    pub error: Option<String>,
}

pub struct SchedulerService {
    config: SchedulerConfig,
    sync: Arc<SyncService>,
    running: AtomicBool,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl SchedulerService {
    pub fn new(config: SchedulerConfig, sync: Arc<SyncService>) -> Self {
        Self {
            config,
            sync,
            running: AtomicBool::new(false),
            last_run: Mutex::new(None),
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        let next_run = self
            .config
            .enabled
            .then(|| next_daily_run(Utc::now(), self.config.hour, self.config.minute));
        SchedulerStatus {
            enabled: self.config.enabled,
            hour: self.config.hour,
            minute: self.config.minute,
            running: self.running.load(Ordering::SeqCst),
            next_run,
            last_run: *self.last_run.lock().await,
        }
    }

    /// Reconcile every active, verified store sequentially.
    ///
    /// Returns per-store results; guarded against concurrent sweeps.
    pub async fn run_sweep(&self) -> Vec<SweepEntry> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Reconciliation sweep already running; skipping");
            return Vec::new();
        }

        let started = Utc::now();
        let mut entries = Vec::new();

        let stores = match store::list_active_verified_stores(self.sync.pool()).await {
            Ok(stores) => stores,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list stores for reconciliation");
                self.running.store(false, Ordering::SeqCst);
                return Vec::new();
            }
        };

        tracing::info!(stores = stores.len(), "Reconciliation sweep started");
        for row in stores {
            let merchant_id = row.merchant_id.clone();
            match self.sync.reconcile(&row).await {
                Ok(report) => entries.push(SweepEntry {
                    merchant_id,
                    ok: true,
                    upserted: report.upserted,
                    soft_deleted: report.soft_deleted,
                    error: None,
                }),
                Err(e) => {
                    tracing::warn!(merchant_id = %merchant_id, error = %e, "Store reconciliation failed");
                    entries.push(SweepEntry {
                        merchant_id,
                        ok: false,
                        upserted: 0,
                        soft_deleted: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        *self.last_run.lock().await = Some(started);
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(
            stores = entries.len(),
            failed = entries.iter().filter(|e| !e.ok).count(),
            "Reconciliation sweep finished"
        );
        entries
    }

    /// Spawn the daily loop. Returns None when the scheduler is disabled.
    pub fn start(
        self: &Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("Reconciliation scheduler disabled");
            return None;
        }

        let service = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = next_daily_run(now, service.config.hour, service.config.minute);
                let wait = (next - now)
                    .to_std()
                    .unwrap_or(Duration::from_secs(60));
                tracing::debug!(next_run = %next, "Scheduler sleeping until next reconciliation");

                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Scheduler shutting down");
                            return;
                        }
                    }
                    _ = tokio::time::sleep(wait) => {
                        service.run_sweep().await;
                    }
                }
            }
        }))
    }
}
