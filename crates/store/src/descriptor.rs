//! The storage-backend projection of a status record.
//!
//! One [`ProcessDescriptor`] exists per (backend × execution id). Backends
//! that cannot model the status record natively persist it through the
//! fixed field set here plus an opaque serialized snapshot; the mapping is
//! an explicit encode/decode contract, not a persistence framework
//! concern.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tellus_core::{
    ClusterId, DbId, ExecutionId, ExecutionStatus, Phase, PhaseId, Timestamp,
};

use crate::error::StoreError;

/// Stored projection of one [`ExecutionStatus`].
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    /// Storage-local identifier (BIGSERIAL in Postgres, `None` elsewhere).
    pub id: Option<DbId>,
    pub cluster_id: ClusterId,
    pub execution_id: ExecutionId,
    /// Phase ordinal, see [`Phase::id`].
    pub phase: PhaseId,
    /// Opaque snapshot of the full status record.
    pub serialized_status: serde_json::Value,
    pub progress: f32,
    pub result: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProcessDescriptor {
    /// Encode a status record into its stored projection.
    pub fn from_status(status: &ExecutionStatus) -> Result<Self, StoreError> {
        Ok(Self {
            id: None,
            cluster_id: status.cluster_id.clone(),
            execution_id: status.execution_id.clone(),
            phase: status.phase.id(),
            serialized_status: serde_json::to_value(status)?,
            progress: status.progress,
            result: status.result.clone(),
            created_at: status.created_at,
            updated_at: status.updated_at,
        })
    }

    /// Decode the snapshot back into a status record.
    pub fn into_status(self) -> Result<ExecutionStatus, StoreError> {
        Ok(serde_json::from_value(self.serialized_status)?)
    }

    /// Decode without consuming the descriptor.
    pub fn to_status(&self) -> Result<ExecutionStatus, StoreError> {
        Ok(serde_json::from_value(self.serialized_status.clone())?)
    }

    /// The decoded phase.
    pub fn phase(&self) -> Result<Phase, StoreError> {
        Ok(Phase::from_id(self.phase)?)
    }

    /// Apply a mutation to the decoded record and re-encode, keeping the
    /// narrow columns (`phase`, `progress`, `result`) in sync with the
    /// snapshot.
    pub fn modify_status(
        &mut self,
        mutate: impl FnOnce(&mut ExecutionStatus) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut status = self.to_status()?;
        mutate(&mut status)?;
        self.phase = status.phase.id();
        self.progress = status.progress;
        self.result = status.result.clone();
        self.updated_at = status.updated_at;
        self.serialized_status = serde_json::to_value(&status)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StatusQuery
// ---------------------------------------------------------------------------

/// Filter for [`StatusStore::get_all`](crate::StatusStore::get_all).
///
/// A record matches when:
/// - its phase is in `phases`, OR its progress is at least
///   `or_progress_at_least` (when set); an empty `phases` with no
///   progress arm matches every phase; and
/// - it belongs to `cluster_id` (when set); and
/// - it was last updated before `older_than` (when set).
#[derive(Debug, Clone, Default)]
pub struct StatusQuery {
    pub phases: Vec<Phase>,
    pub or_progress_at_least: Option<f32>,
    pub cluster_id: Option<ClusterId>,
    pub older_than: Option<Timestamp>,
}

impl StatusQuery {
    /// Match every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// The janitor's sweep filter: terminal phase, or progress at 100.
    pub fn stale(older_than: Option<Timestamp>) -> Self {
        Self {
            phases: tellus_core::TERMINAL_PHASES.to_vec(),
            or_progress_at_least: Some(100.0),
            cluster_id: None,
            older_than,
        }
    }

    /// Whether a descriptor satisfies this filter.
    pub fn matches(&self, descriptor: &ProcessDescriptor) -> bool {
        let phase_matches = if self.phases.is_empty() && self.or_progress_at_least.is_none() {
            true
        } else {
            self.phases.iter().any(|p| p.id() == descriptor.phase)
                || self
                    .or_progress_at_least
                    .is_some_and(|min| descriptor.progress >= min)
        };
        let cluster_matches = self
            .cluster_id
            .as_ref()
            .is_none_or(|c| *c == descriptor.cluster_id);
        let age_matches = self
            .older_than
            .is_none_or(|cutoff| descriptor.updated_at < cutoff);
        phase_matches && cluster_matches && age_matches
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
