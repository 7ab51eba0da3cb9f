//! Cluster-wide status propagation.
//!
//! The propagator is the only component allowed to fan a single logical
//! mutation out to every registered status store. Writes are
//! write-through: once a mutating call returns, any store-backed reader
//! observes the change. A failure on the authoritative store (highest
//! priority) is returned to the caller; failures on lower-priority
//! stores are consistency drift: logged, never fatal.

use std::collections::HashSet;
use std::time::Duration;

use std::sync::Arc;

use tellus_core::{ClusterId, ExecutionId, ExecutionStatus, Phase, ProcessData};
use tellus_store::{ProcessDescriptor, StatusStore, StoreError};
use tokio::sync::RwLock;

use crate::publish::{ResultPublisher, ResultValue};

/// Fans status mutations out to every registered store and resolves
/// which node owns an execution.
pub struct ClusterPropagator {
    cluster_id: ClusterId,
    /// Priority order, highest (authoritative) first.
    stores: Vec<Arc<dyn StatusStore>>,
    /// Priority order, highest first.
    publishers: Vec<Arc<dyn ResultPublisher>>,
    /// Executions owned by this node, the zero-latency ownership path.
    local: RwLock<HashSet<ExecutionId>>,
}

impl ClusterPropagator {
    /// Build a propagator over explicit store and publisher lists.
    ///
    /// Both lists are sorted by descending priority here; callers hand in
    /// whatever was configured at startup, in any order.
    pub fn new(
        cluster_id: ClusterId,
        mut stores: Vec<Arc<dyn StatusStore>>,
        mut publishers: Vec<Arc<dyn ResultPublisher>>,
    ) -> Self {
        stores.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        publishers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        Self {
            cluster_id,
            stores,
            publishers,
            local: RwLock::new(HashSet::new()),
        }
    }

    /// This node's stable cluster id.
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    /// The registered stores, authoritative first.
    pub fn stores(&self) -> &[Arc<dyn StatusStore>] {
        &self.stores
    }

    // -- local ownership ----------------------------------------------------

    /// Mark an execution as owned (executing) on this node.
    pub async fn register_local(&self, execution_id: &str) {
        self.local.write().await.insert(execution_id.to_string());
    }

    /// Drop local ownership (record discarded or swept).
    pub async fn forget_local(&self, execution_id: &str) {
        self.local.write().await.remove(execution_id);
    }

    /// Whether this node owns the execution.
    pub async fn is_local(&self, execution_id: &str) -> bool {
        self.local.read().await.contains(execution_id)
    }

    /// Resolve the owning node for an execution.
    ///
    /// Fast path: the local ownership table, with zero store traffic.
    /// Slow path: the stores, in priority order, first answer wins. The
    /// same discipline as the write fan-out applies: a failing secondary
    /// store is logged and skipped, only the authoritative store's error
    /// is surfaced, and then only when no other store answered.
    pub async fn owner(&self, execution_id: &str) -> Result<Option<ClusterId>, StoreError> {
        if self.is_local(execution_id).await {
            return Ok(Some(self.cluster_id.clone()));
        }
        let mut authoritative_error = None;
        for (idx, store) in self.stores.iter().enumerate() {
            match store.get_owner(execution_id, true).await {
                Ok(Some(owner)) => return Ok(Some(owner)),
                Ok(None) => {}
                Err(e) => {
                    self.note_store_failure(idx, execution_id, "get_owner", &e);
                    if idx == 0 {
                        authoritative_error = Some(e);
                    }
                }
            }
        }
        match authoritative_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    // -- write-through fan-out ----------------------------------------------

    /// Persist the full record to every store before returning.
    pub async fn write_through(&self, status: &ExecutionStatus) -> Result<(), StoreError> {
        let descriptor = ProcessDescriptor::from_status(status)?;
        let mut authoritative_error = None;

        for (idx, store) in self.stores.iter().enumerate() {
            if let Err(e) = store.put(descriptor.clone()).await {
                self.note_store_failure(idx, &status.execution_id, "put", &e);
                if idx == 0 {
                    authoritative_error = Some(e);
                }
            }
        }

        match authoritative_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fan a narrow phase update out to every store.
    pub async fn update_phase(
        &self,
        cluster_id: &str,
        execution_id: &str,
        phase: Phase,
    ) -> Result<(), StoreError> {
        let mut authoritative_error = None;
        for (idx, store) in self.stores.iter().enumerate() {
            // Only the authoritative store is expected to hold the record.
            let lenient = idx > 0;
            if let Err(e) = store
                .update_phase(cluster_id, execution_id, phase, lenient)
                .await
            {
                self.note_store_failure(idx, execution_id, "update_phase", &e);
                if idx == 0 {
                    authoritative_error = Some(e);
                }
            }
        }
        match authoritative_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fan a narrow progress update out to every store.
    pub async fn update_progress(
        &self,
        cluster_id: &str,
        execution_id: &str,
        progress: f32,
    ) -> Result<(), StoreError> {
        let mut authoritative_error = None;
        for (idx, store) in self.stores.iter().enumerate() {
            let lenient = idx > 0;
            if let Err(e) = store
                .update_progress(cluster_id, execution_id, progress, lenient)
                .await
            {
                self.note_store_failure(idx, execution_id, "update_progress", &e);
                if idx == 0 {
                    authoritative_error = Some(e);
                }
            }
        }
        match authoritative_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fan an already-publishable result reference out to every store.
    pub async fn store_result_raw(
        &self,
        cluster_id: &str,
        execution_id: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut authoritative_error = None;
        for (idx, store) in self.stores.iter().enumerate() {
            let lenient = idx > 0;
            if let Err(e) = store
                .store_result(cluster_id, execution_id, value, lenient)
                .await
            {
                self.note_store_failure(idx, execution_id, "store_result", &e);
                if idx == 0 {
                    authoritative_error = Some(e);
                }
            }
        }
        match authoritative_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fan the advisory submit hook out to every store, letting durable
    /// backends pre-create the `Queued` row they will update later.
    pub async fn submit_hooks(
        &self,
        status: &ExecutionStatus,
        chained: bool,
    ) -> Result<(), StoreError> {
        let descriptor = ProcessDescriptor::from_status(status)?;
        let mut authoritative_error = None;
        for (idx, store) in self.stores.iter().enumerate() {
            let result = if chained {
                store.submit_chained(descriptor.clone()).await
            } else {
                store.submit(descriptor.clone()).await
            };
            if let Err(e) = result {
                self.note_store_failure(idx, &status.execution_id, "submit", &e);
                if idx == 0 {
                    authoritative_error = Some(e);
                }
            }
        }
        match authoritative_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Remove an execution's record from every store and drop local
    /// ownership. Used for explicit discards.
    pub async fn remove(&self, cluster_id: &str, execution_id: &str) -> Result<(), StoreError> {
        let mut authoritative_error = None;
        for (idx, store) in self.stores.iter().enumerate() {
            if let Err(e) = store.remove(cluster_id, execution_id, true).await {
                self.note_store_failure(idx, execution_id, "remove", &e);
                if idx == 0 {
                    authoritative_error = Some(e);
                }
            }
        }
        self.forget_local(execution_id).await;
        match authoritative_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // -- result publication -------------------------------------------------

    /// Convert a result value to its publishable reference and fan it out.
    ///
    /// `Inline` values are stored verbatim. `File` artifacts go through
    /// the publishers in priority order; the first successful external
    /// reference is stored. With no working publisher the path's display
    /// form is stored as a last resort, with a warning; remote readers
    /// may not be able to reach it.
    pub async fn publish_result(
        &self,
        execution_id: &str,
        value: ResultValue,
    ) -> Result<String, StoreError> {
        let reference = match value {
            ResultValue::Inline(s) => s,
            ResultValue::File(path) => {
                let mut published = None;
                for publisher in &self.publishers {
                    match publisher.publish(&path).await {
                        Ok(reference) => {
                            published = Some(reference);
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                execution_id,
                                artifact = %path.display(),
                                error = %e,
                                "Result publisher failed, trying next"
                            );
                        }
                    }
                }
                published.unwrap_or_else(|| {
                    tracing::warn!(
                        execution_id,
                        artifact = %path.display(),
                        "No publisher produced a reference, storing the local path"
                    );
                    path.display().to_string()
                })
            }
        };

        self.store_result_raw(&self.cluster_id, execution_id, &reference)
            .await?;
        Ok(reference)
    }

    // -- store-backed reads -------------------------------------------------

    /// Fetch the richest store-backed view of an execution, resolving the
    /// owner first. The highest-priority store holding the record wins.
    pub async fn fetch(
        &self,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ExecutionStatus>, StoreError> {
        let owner = match self.owner(execution_id).await? {
            Some(owner) => owner,
            None if lenient => return Ok(None),
            None => return Err(StoreError::NotFound(execution_id.to_string())),
        };
        for store in &self.stores {
            if let Some(descriptor) = store.get(&owner, execution_id, true).await? {
                return Ok(Some(descriptor.into_status()?));
            }
        }
        if lenient {
            Ok(None)
        } else {
            Err(StoreError::NotFound(execution_id.to_string()))
        }
    }

    /// Poll the stores for a remotely-owned execution's output, per the
    /// blocking-retrieval contract.
    pub async fn get_output_remote(
        &self,
        owner: &str,
        execution_id: &str,
        timeout: Duration,
        lenient: bool,
    ) -> Result<Option<ProcessData>, StoreError> {
        for store in &self.stores {
            if store.get(owner, execution_id, true).await?.is_some() {
                return store.get_output(owner, execution_id, timeout, lenient).await;
            }
        }
        if lenient {
            Ok(None)
        } else {
            Err(StoreError::NotFound(execution_id.to_string()))
        }
    }

    fn note_store_failure(&self, idx: usize, execution_id: &str, op: &str, error: &StoreError) {
        if idx == 0 {
            tracing::error!(execution_id, op, error = %error, "Authoritative store call failed");
        } else {
            // Eventual-consistency drift: surfaced, not fatal.
            tracing::warn!(
                execution_id,
                op,
                store_index = idx,
                error = %error,
                "Secondary store call failed"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
