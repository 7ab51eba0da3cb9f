//! Execution phase state machine.
//!
//! Phases advance monotonically toward a terminal state:
//! `Queued -> Running -> {Completed, Failed, Cancelled}`, with the one
//! extra rule that cancellation is always reachable from a non-terminal
//! phase. No transition out of a terminal phase is ever permitted.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Ordinal type for phases as persisted by durable status stores.
pub type PhaseId = i16;

/// The discrete state of an execution's state machine.
///
/// Discriminants are stable and match the `phase` column in durable
/// backends (1-based, in lifecycle order).
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Accepted and persisted, not yet picked up by a worker pool.
    Queued = 1,
    /// Currently executing on the owning node.
    Running = 2,
    /// Finished successfully; outputs are available.
    Completed = 3,
    /// The process raised; the failure reason is recorded as the result.
    Failed = 4,
    /// Reached via cooperative cancellation.
    Cancelled = 5,
}

/// The three terminal phases, in ordinal order.
pub const TERMINAL_PHASES: [Phase; 3] = [Phase::Completed, Phase::Failed, Phase::Cancelled];

impl Phase {
    /// Return the stored ordinal for this phase.
    pub fn id(self) -> PhaseId {
        self as PhaseId
    }

    /// Look a phase up by its stored ordinal.
    pub fn from_id(id: PhaseId) -> Result<Self, CoreError> {
        match id {
            1 => Ok(Self::Queued),
            2 => Ok(Self::Running),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Failed),
            5 => Ok(Self::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Unknown phase ordinal: {other}"
            ))),
        }
    }

    /// Whether this phase admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Re-asserting the current phase is always allowed (treated as a
    /// no-op by callers); everything else must move forward.
    pub fn can_transition_to(self, next: Phase) -> bool {
        if self == next {
            return true;
        }
        match self {
            Self::Queued => true,
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Lowercase name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ids_are_stable() {
        assert_eq!(Phase::Queued.id(), 1);
        assert_eq!(Phase::Running.id(), 2);
        assert_eq!(Phase::Completed.id(), 3);
        assert_eq!(Phase::Failed.id(), 4);
        assert_eq!(Phase::Cancelled.id(), 5);
    }

    #[test]
    fn from_id_round_trips() {
        for phase in [
            Phase::Queued,
            Phase::Running,
            Phase::Completed,
            Phase::Failed,
            Phase::Cancelled,
        ] {
            assert_eq!(Phase::from_id(phase.id()).unwrap(), phase);
        }
    }

    #[test]
    fn from_id_rejects_unknown_ordinal() {
        assert!(Phase::from_id(0).is_err());
        assert!(Phase::from_id(6).is_err());
    }

    #[test]
    fn only_last_three_phases_are_terminal() {
        assert!(!Phase::Queued.is_terminal());
        assert!(!Phase::Running.is_terminal());
        assert!(Phase::Completed.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(Phase::Cancelled.is_terminal());
    }

    #[test]
    fn queued_may_reach_any_phase() {
        assert!(Phase::Queued.can_transition_to(Phase::Running));
        assert!(Phase::Queued.can_transition_to(Phase::Completed));
        assert!(Phase::Queued.can_transition_to(Phase::Failed));
        assert!(Phase::Queued.can_transition_to(Phase::Cancelled));
    }

    #[test]
    fn running_may_only_reach_terminal_phases() {
        assert!(Phase::Running.can_transition_to(Phase::Completed));
        assert!(Phase::Running.can_transition_to(Phase::Failed));
        assert!(Phase::Running.can_transition_to(Phase::Cancelled));
        assert!(!Phase::Running.can_transition_to(Phase::Queued));
    }

    #[test]
    fn terminal_phases_admit_no_transition() {
        for terminal in TERMINAL_PHASES {
            assert!(!terminal.can_transition_to(Phase::Queued));
            assert!(!terminal.can_transition_to(Phase::Running));
            for other in TERMINAL_PHASES {
                if other != terminal {
                    assert!(!terminal.can_transition_to(other));
                }
            }
        }
    }

    #[test]
    fn same_phase_transition_is_allowed() {
        for phase in [Phase::Queued, Phase::Running, Phase::Completed] {
            assert!(phase.can_transition_to(phase));
        }
    }

    #[test]
    fn serde_uses_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&Phase::Cancelled).unwrap(),
            "\"cancelled\""
        );
        let parsed: Phase = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(parsed, Phase::Running);
    }
}
