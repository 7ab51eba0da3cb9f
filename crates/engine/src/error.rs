use std::time::Duration;

use tellus_core::{CoreError, ProcessName};
use tellus_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An expected execution is absent. Suppressed to `None` only when
    /// the caller opts into lenient lookup.
    #[error("Execution not found: {0}")]
    NotFound(String),

    /// A submission referenced an unregistered process name.
    #[error("Unknown process: {0}")]
    UnknownProcess(ProcessName),

    /// The invokable raised; carries the recorded failure reason.
    #[error("Process failed: {0}")]
    ProcessFailure(String),

    /// The output did not become available within the requested wait.
    #[error("Timed out after {0:?} waiting for output")]
    Timeout(Duration),

    /// The terminal phase was reached via cooperative cancellation.
    #[error("Execution was cancelled")]
    Cancelled,

    /// A non-lenient store operation failed unexpectedly.
    #[error("Status store inconsistency: {0}")]
    StoreInconsistency(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(execution_id) => Self::NotFound(execution_id),
            StoreError::Failure(reason) => Self::ProcessFailure(reason),
            StoreError::Cancelled => Self::Cancelled,
            StoreError::Timeout(timeout) => Self::Timeout(timeout),
            StoreError::Core(core) => Self::Core(core),
            other => Self::StoreInconsistency(other.to_string()),
        }
    }
}
