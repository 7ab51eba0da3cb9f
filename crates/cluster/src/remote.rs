//! Store-backed view of an execution owned by another node.
//!
//! Composition, not subclassing: a [`RemoteStatus`] pairs a plain
//! snapshot read with mutators that forward to the propagator's store
//! fan-out instead of any local in-memory record.

use std::sync::Arc;

use tellus_core::{ClusterId, ExecutionId, ExecutionStatus, Phase};
use tellus_store::StoreError;

use crate::propagator::ClusterPropagator;

/// Proxy for a remotely-owned execution. Reads come from the stores;
/// writes are forwarded to every store through the propagator.
pub struct RemoteStatus {
    propagator: Arc<ClusterPropagator>,
    owner: ClusterId,
    execution_id: ExecutionId,
}

impl RemoteStatus {
    /// Resolve the owner of `execution_id` and build a proxy for it.
    ///
    /// Returns `None` when no node in the cluster knows the execution.
    pub async fn resolve(
        propagator: Arc<ClusterPropagator>,
        execution_id: &str,
    ) -> Result<Option<Self>, StoreError> {
        let owner = match propagator.owner(execution_id).await? {
            Some(owner) => owner,
            None => return Ok(None),
        };
        Ok(Some(Self {
            propagator,
            owner,
            execution_id: execution_id.to_string(),
        }))
    }

    /// The node executing this record.
    pub fn owner(&self) -> &ClusterId {
        &self.owner
    }

    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    /// Read the current stored record.
    pub async fn snapshot(&self) -> Result<ExecutionStatus, StoreError> {
        self.propagator
            .fetch(&self.execution_id, false)
            .await?
            .ok_or_else(|| StoreError::NotFound(self.execution_id.clone()))
    }

    /// Forward a phase change to every store.
    pub async fn set_phase(&self, phase: Phase) -> Result<(), StoreError> {
        self.propagator
            .update_phase(&self.owner, &self.execution_id, phase)
            .await
    }

    /// Forward a progress change to every store.
    pub async fn set_progress(&self, progress: f32) -> Result<(), StoreError> {
        self.propagator
            .update_progress(&self.owner, &self.execution_id, progress)
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
