//! Notification contract for terminal executions.
//!
//! A sender is invoked once per execution reaching `Completed` or
//! `Failed`. Delivery failures are the sender's caller's problem to log;
//! they are never propagated as execution failures.

use async_trait::async_trait;

use crate::email::EmailError;

/// The terminal outcome reported to a notification sender.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The execution completed; carries the stored result reference, if any.
    Completed { result: Option<String> },
    /// The execution failed; carries the recorded reason.
    Failed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers a terminal-outcome notification to one address.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn notify(
        &self,
        address: &str,
        execution_id: &str,
        outcome: &ExecutionOutcome,
    ) -> Result<(), NotifyError>;
}
