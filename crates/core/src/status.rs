//! The status record: one per execution attempt.
//!
//! [`ExecutionStatus`] is a plain, serializable entity. All invariants of
//! the state machine live here: monotonic phase transitions, monotonic
//! progress, and outputs populated exactly once at completion. Cluster
//! write-through is layered on top by the engine, not baked in.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::phase::Phase;
use crate::process::ProcessName;
use crate::types::{ClusterId, ExecutionId, ProcessData, Timestamp};

/// Tracks one execution attempt from submission to a terminal phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatus {
    /// Globally unique across the whole cluster at any instant.
    pub execution_id: ExecutionId,
    /// Qualified name of the unit of work.
    pub process_name: ProcessName,
    /// Node that owns (is executing) this record.
    pub cluster_id: ClusterId,
    /// Current state-machine phase.
    pub phase: Phase,
    /// Percentage in `0.0..=100.0`, non-decreasing while non-terminal.
    pub progress: f32,
    /// Named results, populated exactly when the phase reaches `Completed`.
    pub output: Option<ProcessData>,
    /// Externally publishable result reference, or the failure reason.
    pub result: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ExecutionStatus {
    /// Create a fresh `Queued` record owned by `cluster_id`.
    pub fn new(
        execution_id: ExecutionId,
        process_name: ProcessName,
        cluster_id: ClusterId,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            execution_id,
            process_name,
            cluster_id,
            phase: Phase::Queued,
            progress: 0.0,
            output: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record has reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Apply a phase transition.
    ///
    /// Re-asserting the current phase is a no-op. Any other transition
    /// that does not move the state machine forward is rejected with
    /// [`CoreError::InvalidTransition`]: mutating a terminal record is
    /// always a reported inconsistency, never silently dropped.
    pub fn set_phase(&mut self, phase: Phase) -> Result<(), CoreError> {
        if self.phase == phase {
            return Ok(());
        }
        if !self.phase.can_transition_to(phase) {
            return Err(CoreError::InvalidTransition {
                from: self.phase,
                to: phase,
            });
        }
        self.phase = phase;
        self.touch();
        Ok(())
    }

    /// Update progress.
    ///
    /// Accepted only while `Queued` or `Running`. The value is clamped to
    /// `0.0..=100.0`, and a value lower than the current one is ignored so
    /// that the observed sequence is non-decreasing; resets are not
    /// permitted.
    pub fn set_progress(&mut self, percent: f32) -> Result<(), CoreError> {
        if self.is_terminal() {
            return Err(CoreError::TerminalProgress(self.phase));
        }
        let clamped = percent.clamp(0.0, 100.0);
        if clamped > self.progress {
            self.progress = clamped;
            self.touch();
        }
        Ok(())
    }

    /// Transition to `Completed`, populating outputs and the optional
    /// result reference, and forcing progress to 100.
    pub fn complete(
        &mut self,
        outputs: ProcessData,
        result: Option<String>,
    ) -> Result<(), CoreError> {
        self.set_phase(Phase::Completed)?;
        self.progress = 100.0;
        self.output = Some(outputs);
        self.result = result;
        Ok(())
    }

    /// Transition to `Failed`, recording the failure reason as the result.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        self.set_phase(Phase::Failed)?;
        self.result = Some(reason.into());
        Ok(())
    }

    /// Transition to `Cancelled`.
    pub fn cancel(&mut self) -> Result<(), CoreError> {
        self.set_phase(Phase::Cancelled)
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
