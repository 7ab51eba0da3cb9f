use crate::phase::Phase;
use crate::types::ExecutionId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Execution not found: {0}")]
    NotFound(ExecutionId),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Cannot update progress of a {0} execution")]
    TerminalProgress(Phase),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}
