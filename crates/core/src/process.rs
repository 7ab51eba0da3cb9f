//! Process naming and the execution contract.
//!
//! A [`Process`] is one invokable unit of work. It receives its inputs and
//! an [`ExecutionListener`] bound to the status record tracking it, and is
//! expected to poll [`ExecutionListener::is_canceled`] at reasonable
//! intervals; cancellation is cooperative, never preemptive.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::ProcessData;

/// Maximum length of a process name component.
const MAX_COMPONENT_LEN: usize = 128;

// ---------------------------------------------------------------------------
// ProcessName
// ---------------------------------------------------------------------------

/// Qualified name of a unit of work: a namespace plus a local name,
/// rendered as `namespace:local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessName {
    pub namespace: String,
    pub local: String,
}

impl ProcessName {
    /// Build a validated process name from its two components.
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Result<Self, CoreError> {
        let namespace = namespace.into();
        let local = local.into();
        validate_component("namespace", &namespace)?;
        validate_component("local name", &local)?;
        Ok(Self { namespace, local })
    }

    /// Parse a `namespace:local` string.
    pub fn parse(qualified: &str) -> Result<Self, CoreError> {
        match qualified.split_once(':') {
            Some((ns, local)) => Self::new(ns, local),
            None => Err(CoreError::Validation(format!(
                "Process name must be of the form namespace:local, got '{qualified}'"
            ))),
        }
    }

    /// The `namespace:local` form.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.namespace, self.local)
    }
}

impl std::fmt::Display for ProcessName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.local)
    }
}

/// Validate one name component.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_COMPONENT_LEN` characters.
/// - Must contain only alphanumeric, hyphen, underscore, or dot characters.
fn validate_component(what: &str, value: &str) -> Result<(), CoreError> {
    if value.is_empty() {
        return Err(CoreError::Validation(format!(
            "Process {what} must not be empty"
        )));
    }
    if value.len() > MAX_COMPONENT_LEN {
        return Err(CoreError::Validation(format!(
            "Process {what} must not exceed {MAX_COMPONENT_LEN} characters"
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::Validation(format!(
            "Process {what} may only contain alphanumeric, hyphen, underscore, or dot characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Process contract
// ---------------------------------------------------------------------------

/// Errors a process may raise while executing.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The process raised; the message becomes the recorded failure reason.
    #[error("{0}")]
    Failure(String),

    /// The process observed the cooperative cancellation flag and stopped.
    #[error("execution was cancelled")]
    Cancelled,
}

/// What a process produced on success.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Named result values, stored on the status record at completion.
    pub outputs: ProcessData,
    /// Optional large local artifact. Published to an externally reachable
    /// reference before storage; the artifact itself is never fanned out.
    pub artifact: Option<PathBuf>,
}

impl ProcessOutput {
    /// Outputs only, no artifact.
    pub fn new(outputs: ProcessData) -> Self {
        Self {
            outputs,
            artifact: None,
        }
    }

    /// Attach a local artifact to be published alongside the outputs.
    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact = Some(path.into());
        self
    }
}

/// The binding between a running process and its status record.
///
/// Progress reports and cancellation polling both flow through here; the
/// engine supplies the implementation wired to the record and the cluster
/// write-through path.
#[async_trait]
pub trait ExecutionListener: Send + Sync {
    /// Report progress as a percentage in `0.0..=100.0`.
    ///
    /// Values lower than the last reported one are ignored; the observed
    /// sequence is non-decreasing.
    async fn progress(&self, percent: f32);

    /// Whether cancellation has been requested for this execution.
    fn is_canceled(&self) -> bool;

    /// Record an error encountered mid-execution. The message becomes the
    /// failure reason if the process ultimately fails.
    async fn exception_occurred(&self, message: &str);

    /// Signal that the process finished its work (progress reaches 100).
    async fn complete(&self);
}

/// One invokable unit of work.
#[async_trait]
pub trait Process: Send + Sync {
    /// Run with the given inputs, reporting through `listener`.
    async fn execute(
        &self,
        inputs: &ProcessData,
        listener: &dyn ExecutionListener,
    ) -> Result<ProcessOutput, ProcessError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_round_trips() {
        let name = ProcessName::new("geo", "reproject").unwrap();
        assert_eq!(name.qualified(), "geo:reproject");
        assert_eq!(ProcessName::parse("geo:reproject").unwrap(), name);
    }

    #[test]
    fn display_matches_qualified_form() {
        let name = ProcessName::new("vec", "clip").unwrap();
        assert_eq!(name.to_string(), "vec:clip");
    }

    #[test]
    fn parse_rejects_unqualified_name() {
        assert!(ProcessName::parse("reproject").is_err());
    }

    #[test]
    fn empty_components_rejected() {
        assert!(ProcessName::new("", "clip").is_err());
        assert!(ProcessName::new("vec", "").is_err());
        assert!(ProcessName::parse(":clip").is_err());
    }

    #[test]
    fn component_with_spaces_rejected() {
        assert!(ProcessName::new("geo", "re project").is_err());
    }

    #[test]
    fn overlong_component_rejected() {
        let long = "a".repeat(MAX_COMPONENT_LEN + 1);
        assert!(ProcessName::new(long, "clip").is_err());
    }

    #[test]
    fn process_output_with_artifact() {
        let out = ProcessOutput::new(ProcessData::new()).with_artifact("/tmp/result.tif");
        assert_eq!(out.artifact.as_deref().unwrap().to_str(), Some("/tmp/result.tif"));
    }

    #[test]
    fn process_error_display() {
        assert_eq!(ProcessError::Failure("boom".into()).to_string(), "boom");
        assert_eq!(
            ProcessError::Cancelled.to_string(),
            "execution was cancelled"
        );
    }
}
