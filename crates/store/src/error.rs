use std::time::Duration;

use tellus_core::{CoreError, ExecutionId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An expected record is absent. Suppressed to `None` only when the
    /// caller opts into lenient lookup.
    #[error("No status record for execution {0}")]
    NotFound(ExecutionId),

    /// The stored execution reached `Failed`; carries the recorded reason.
    #[error("Process failed: {0}")]
    Failure(String),

    /// The stored execution reached `Cancelled`.
    #[error("Execution was cancelled")]
    Cancelled,

    /// The output did not become available within the requested wait.
    #[error("Timed out after {0:?} waiting for a terminal phase")]
    Timeout(Duration),

    /// A read or write against the backend failed unexpectedly.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend-agnostic store failure (network, protocol, corruption).
    #[error("Store inconsistency: {0}")]
    Inconsistency(String),

    /// The serialized status snapshot could not be encoded or decoded.
    #[error("Status serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A state-machine invariant was violated by a stored mutation.
    #[error(transparent)]
    Core(#[from] CoreError),
}
