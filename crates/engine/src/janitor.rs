//! Stale-record janitor.
//!
//! Periodically removes finished execution records: anything in a
//! terminal phase, or with progress at 100, whose last update is older
//! than the configured retention. Each store is swept independently and
//! best-effort; one broken backend never blocks cleanup of the others.

use std::sync::Arc;
use std::time::Duration;

use tellus_store::{StatusQuery, StatusStore};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::coordinator::Coordinator;

/// Background sweeper for finished execution records.
pub struct StatusJanitor {
    stores: Vec<Arc<dyn StatusStore>>,
    interval: Duration,
    retention: Duration,
    coordinator: Option<Arc<Coordinator>>,
}

impl StatusJanitor {
    pub fn new(stores: Vec<Arc<dyn StatusStore>>, config: &EngineConfig) -> Self {
        Self {
            stores,
            interval: config.janitor_interval,
            retention: config.retention,
            coordinator: None,
        }
    }

    /// Also drop this node's local handles for swept executions.
    pub fn with_coordinator(mut self, coordinator: Arc<Coordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Run sweeps on the configured interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "Status janitor started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        // The immediate first tick would sweep records from a previous
        // run before anything new has happened; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep().await;
                    if removed > 0 {
                        tracing::info!(removed, "Janitor sweep finished");
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Status janitor stopping");
                    break;
                }
            }
        }
    }

    /// One sweep across every store. Returns how many records were
    /// removed. Errors are logged per store and per record; the sweep
    /// always visits everything it can.
    pub async fn sweep(&self) -> usize {
        let older_than = if self.retention.is_zero() {
            None
        } else {
            chrono::Duration::from_std(self.retention)
                .ok()
                .map(|retention| chrono::Utc::now() - retention)
        };
        let query = StatusQuery::stale(older_than);

        let mut removed = 0;
        for store in &self.stores {
            let stale = match store.get_all(&query).await {
                Ok(stale) => stale,
                Err(e) => {
                    tracing::error!(error = %e, "Janitor could not list a store, skipping it");
                    continue;
                }
            };
            for descriptor in stale {
                match store
                    .remove(&descriptor.cluster_id, &descriptor.execution_id, true)
                    .await
                {
                    Ok(Some(_)) => removed += 1,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(
                            execution_id = descriptor.execution_id,
                            error = %e,
                            "Janitor could not remove a record"
                        );
                    }
                }
            }
        }

        if let Some(coordinator) = &self.coordinator {
            removed += coordinator.sweep_terminal(older_than).await;
        }
        removed
    }
}
