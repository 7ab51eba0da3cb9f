//! The submission coordinator.
//!
//! Front door for every execution operation:
//!
//! - `submit` validates the process name, creates the `Queued` record,
//!   fans the submit hooks out, and hands the run to a bounded worker
//!   pool.
//! - `submit_chained` runs a sub-process inline on the caller's task so a
//!   chain of N processes consumes a single pool slot.
//! - `cancel` raises the cooperative cancellation flag.
//! - `get_status` answers with a live local handle or a store-backed
//!   remote proxy.
//! - `get_output` blocks until a terminal phase, locally via a watch
//!   channel, remotely by polling the stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tellus_cluster::{ClusterPropagator, RemoteStatus, ResultValue};
use tellus_core::{
    CoreError, ExecutionId, ExecutionStatus, Phase, Process, ProcessData, ProcessError,
    ProcessName, ProcessRegistry, Timestamp,
};
use tellus_events::{ExecutionOutcome, NotificationSender};
use tokio::sync::RwLock;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::handle::ExecutionHandle;
use crate::listener::StatusListener;
use crate::pool::WorkerPool;

/// Reserved input key carrying the address to notify when the execution
/// reaches a terminal phase. Absent or non-string means no notification.
pub const NOTIFY_INPUT_KEY: &str = "notification_email";

/// Fallback failure reason when a process raises without a message.
const DEFAULT_FAILURE_REASON: &str = "Process failed";

// ---------------------------------------------------------------------------
// StatusView
// ---------------------------------------------------------------------------

/// A resolved execution: either live on this node or reachable through
/// the stores.
pub enum StatusView {
    /// Owned by this node; reads and waits are in-memory.
    Local(Arc<ExecutionHandle>),
    /// Owned elsewhere; reads and writes go through the stores.
    Remote(RemoteStatus),
}

impl std::fmt::Debug for StatusView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(_) => f.write_str("Local(..)"),
            Self::Remote(_) => f.write_str("Remote(..)"),
        }
    }
}

impl StatusView {
    /// A point-in-time copy of the record, wherever it lives.
    pub async fn snapshot(&self) -> Result<ExecutionStatus, EngineError> {
        match self {
            Self::Local(handle) => Ok(handle.snapshot().await),
            Self::Remote(remote) => Ok(remote.snapshot().await?),
        }
    }

    /// Whether the record is owned by this node.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Coordinates submissions, cancellation, status lookup, and output
/// retrieval for this node.
pub struct Coordinator {
    registry: Arc<dyn ProcessRegistry>,
    propagator: Arc<ClusterPropagator>,
    notifier: Option<Arc<dyn NotificationSender>>,
    executions: RwLock<HashMap<ExecutionId, Arc<ExecutionHandle>>>,
    interactive: WorkerPool,
    background: WorkerPool,
}

impl Coordinator {
    pub fn new(
        registry: Arc<dyn ProcessRegistry>,
        propagator: Arc<ClusterPropagator>,
        notifier: Option<Arc<dyn NotificationSender>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            propagator,
            notifier,
            executions: RwLock::new(HashMap::new()),
            interactive: WorkerPool::new("interactive", config.interactive_pool_size),
            background: WorkerPool::new("background", config.background_pool_size),
        }
    }

    /// The propagator this coordinator writes through.
    pub fn propagator(&self) -> &Arc<ClusterPropagator> {
        &self.propagator
    }

    /// Lifetime submission counts, `(interactive, background)`.
    pub fn submitted_counts(&self) -> (u64, u64) {
        (
            self.interactive.submitted_count(),
            self.background.submitted_count(),
        )
    }

    // -- submission ---------------------------------------------------------

    /// Submit an execution onto a worker pool.
    ///
    /// Fails with [`EngineError::UnknownProcess`] before any record is
    /// created or pool slot consumed, and with a conflict if the id is
    /// already live anywhere in the cluster. Returns as soon as the record
    /// is `Queued` and visible through every store.
    pub async fn submit(
        &self,
        execution_id: ExecutionId,
        name: &ProcessName,
        inputs: ProcessData,
        background: bool,
    ) -> Result<(), EngineError> {
        let process = self
            .registry
            .resolve(name)
            .ok_or_else(|| EngineError::UnknownProcess(name.clone()))?;
        let handle = self.admit(&execution_id, name, false).await?;

        let run = Self::run_execution(
            execution_id,
            process,
            inputs,
            handle,
            Arc::clone(&self.propagator),
            self.notifier.clone(),
        );
        let pool = if background {
            &self.background
        } else {
            &self.interactive
        };
        // The run reports through its handle; the pool's completion value
        // is not needed here.
        drop(pool.submit(run));
        Ok(())
    }

    /// Run a sub-process inline on the caller's task and return its
    /// outputs.
    ///
    /// No pool hop: a chain of N processes holds exactly one pool slot,
    /// which rules out the self-deadlock where queued children wait on a
    /// pool filled by their own parents. The child still gets a full
    /// status record and the same lifecycle as any other execution.
    pub async fn submit_chained(
        &self,
        execution_id: ExecutionId,
        name: &ProcessName,
        inputs: ProcessData,
    ) -> Result<ProcessData, EngineError> {
        let process = self
            .registry
            .resolve(name)
            .ok_or_else(|| EngineError::UnknownProcess(name.clone()))?;
        let handle = self.admit(&execution_id, name, true).await?;

        Self::run_execution(
            execution_id,
            process,
            inputs,
            handle,
            Arc::clone(&self.propagator),
            self.notifier.clone(),
        )
        .await
    }

    /// Check uniqueness, create the `Queued` record, register local
    /// ownership, and fan the submit hooks out. On a hook failure the
    /// local registration is rolled back.
    ///
    /// The `executions` write lock is held across both the local check
    /// and the cluster ownership lookup, up to the insert: concurrent
    /// submissions of one id serialize here, so exactly one is admitted.
    async fn admit(
        &self,
        execution_id: &str,
        name: &ProcessName,
        chained: bool,
    ) -> Result<Arc<ExecutionHandle>, EngineError> {
        let status = ExecutionStatus::new(
            execution_id.to_string(),
            name.clone(),
            self.propagator.cluster_id().clone(),
        );
        let handle = ExecutionHandle::new(status.clone());

        {
            let mut executions = self.executions.write().await;
            if executions.contains_key(execution_id)
                || self.propagator.owner(execution_id).await?.is_some()
            {
                return Err(CoreError::Conflict(format!(
                    "Execution id '{execution_id}' is already in use"
                ))
                .into());
            }
            executions.insert(execution_id.to_string(), Arc::clone(&handle));
        }
        self.propagator.register_local(execution_id).await;

        if let Err(e) = self.propagator.submit_hooks(&status, chained).await {
            self.executions.write().await.remove(execution_id);
            self.propagator.forget_local(execution_id).await;
            return Err(e.into());
        }
        Ok(handle)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Request cooperative cancellation of a locally-owned execution.
    ///
    /// Returns immediately; the process observes the flag on its next
    /// listener poll. Cancelling an already-terminal execution is a no-op.
    pub async fn cancel(&self, execution_id: &str) -> Result<(), EngineError> {
        let handle = self
            .executions
            .read()
            .await
            .get(execution_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(execution_id.to_string()))?;
        handle.request_cancel();
        tracing::info!(execution_id, "Cancellation requested");
        Ok(())
    }

    /// Explicitly discard an execution: drop the local handle and remove
    /// its record from every store.
    pub async fn discard(&self, execution_id: &str) -> Result<(), EngineError> {
        self.executions.write().await.remove(execution_id);
        let cluster_id = self.propagator.cluster_id().clone();
        self.propagator.remove(&cluster_id, execution_id).await?;
        Ok(())
    }

    /// Resolve an execution to a local handle or a remote proxy.
    pub async fn get_status(&self, execution_id: &str) -> Result<StatusView, EngineError> {
        if let Some(handle) = self.executions.read().await.get(execution_id).cloned() {
            return Ok(StatusView::Local(handle));
        }
        match RemoteStatus::resolve(Arc::clone(&self.propagator), execution_id).await? {
            Some(remote) => Ok(StatusView::Remote(remote)),
            None => Err(EngineError::NotFound(execution_id.to_string())),
        }
    }

    /// Block until the execution reaches a terminal phase and return its
    /// outputs.
    ///
    /// `Completed` yields the output map. `Failed` raises the recorded
    /// reason, `Cancelled` raises [`EngineError::Cancelled`], and an
    /// exhausted `timeout` raises [`EngineError::Timeout`] regardless of
    /// leniency; `lenient` only converts an absent record into
    /// `Ok(None)`.
    pub async fn get_output(
        &self,
        execution_id: &str,
        timeout: Duration,
        lenient: bool,
    ) -> Result<Option<ProcessData>, EngineError> {
        let local = self.executions.read().await.get(execution_id).cloned();
        if let Some(handle) = local {
            let phase = handle.wait_terminal(timeout).await?;
            let status = handle.snapshot().await;
            return match phase {
                Phase::Completed => Ok(Some(status.output.unwrap_or_default())),
                Phase::Failed => Err(EngineError::ProcessFailure(
                    status
                        .result
                        .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()),
                )),
                Phase::Cancelled => Err(EngineError::Cancelled),
                // wait_terminal only yields terminal phases.
                other => Err(EngineError::StoreInconsistency(format!(
                    "Non-terminal phase {other} reported as terminal"
                ))),
            };
        }

        match self.propagator.owner(execution_id).await? {
            Some(owner) => Ok(self
                .propagator
                .get_output_remote(&owner, execution_id, timeout, lenient)
                .await?),
            None if lenient => Ok(None),
            None => Err(EngineError::NotFound(execution_id.to_string())),
        }
    }

    /// Drop local handles for terminal executions, releasing their
    /// ownership entries. Returns how many were dropped. Called by the
    /// janitor alongside its store sweep.
    pub async fn sweep_terminal(&self, older_than: Option<Timestamp>) -> usize {
        let mut swept = Vec::new();
        {
            let mut executions = self.executions.write().await;
            let mut keep = HashMap::with_capacity(executions.len());
            for (id, handle) in executions.drain() {
                let status = handle.snapshot().await;
                let expired = older_than.is_none_or(|cutoff| status.updated_at < cutoff);
                if status.is_terminal() && expired {
                    swept.push(id);
                } else {
                    keep.insert(id, handle);
                }
            }
            *executions = keep;
        }
        for id in &swept {
            self.propagator.forget_local(id).await;
        }
        swept.len()
    }

    // -- the run itself -----------------------------------------------------

    /// Drive one execution from `Queued` to a terminal phase.
    ///
    /// Every state change goes through the handle so the write-through
    /// ordering holds. Store trouble after a successful local transition
    /// is logged, never allowed to kill a healthy run.
    async fn run_execution(
        execution_id: ExecutionId,
        process: Arc<dyn Process>,
        inputs: ProcessData,
        handle: Arc<ExecutionHandle>,
        propagator: Arc<ClusterPropagator>,
        notifier: Option<Arc<dyn NotificationSender>>,
    ) -> Result<ProcessData, EngineError> {
        let notify_address = inputs
            .get(NOTIFY_INPUT_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_string);

        // A cancel may land while the run is still queued for a pool slot.
        if handle.is_cancel_requested() {
            if let Err(e) = handle.apply(&propagator, |s| s.cancel()).await {
                tracing::warn!(execution_id, error = %e, "Cancelled record not fully written");
            }
            return Err(EngineError::Cancelled);
        }

        if let Err(e) = handle
            .apply(&propagator, |s| s.set_phase(Phase::Running))
            .await
        {
            tracing::warn!(execution_id, error = %e, "Running transition not fully written");
        }

        let listener = StatusListener::new(Arc::clone(&handle), Arc::clone(&propagator));
        tracing::info!(execution_id, "Execution started");
        let outcome = process.execute(&inputs, &listener).await;

        match outcome {
            Ok(output) => {
                // Publish the artifact (if any) and fan the reference out
                // while the record is still Running, then flip to
                // Completed with outputs and reference in one transition.
                let reference = match output.artifact {
                    Some(path) => {
                        match propagator
                            .publish_result(&execution_id, ResultValue::File(path))
                            .await
                        {
                            Ok(reference) => Some(reference),
                            Err(e) => {
                                tracing::error!(execution_id, error = %e, "Result not stored");
                                None
                            }
                        }
                    }
                    None => None,
                };

                let outputs = output.outputs;
                let record = outputs.clone();
                if let Err(e) = handle
                    .apply(&propagator, move |s| s.complete(record, reference))
                    .await
                {
                    tracing::warn!(execution_id, error = %e, "Completed record not fully written");
                }
                tracing::info!(execution_id, "Execution completed");

                let result = handle.snapshot().await.result;
                Self::notify(
                    notifier,
                    notify_address,
                    &execution_id,
                    ExecutionOutcome::Completed { result },
                )
                .await;
                Ok(outputs)
            }
            Err(ProcessError::Cancelled) => {
                if let Err(e) = handle.apply(&propagator, |s| s.cancel()).await {
                    tracing::warn!(execution_id, error = %e, "Cancelled record not fully written");
                }
                tracing::info!(execution_id, "Execution cancelled");
                Err(EngineError::Cancelled)
            }
            Err(ProcessError::Failure(message)) => {
                let reason = if message.is_empty() {
                    listener
                        .take_last_exception()
                        .await
                        .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string())
                } else {
                    message
                };
                let recorded = reason.clone();
                if let Err(e) = handle
                    .apply(&propagator, move |s| s.fail(recorded))
                    .await
                {
                    tracing::warn!(execution_id, error = %e, "Failed record not fully written");
                }
                tracing::warn!(execution_id, reason, "Execution failed");

                Self::notify(
                    notifier,
                    notify_address,
                    &execution_id,
                    ExecutionOutcome::Failed {
                        reason: reason.clone(),
                    },
                )
                .await;
                Err(EngineError::ProcessFailure(reason))
            }
        }
    }

    /// Best-effort terminal notification. Delivery trouble is logged and
    /// swallowed; the execution outcome is already final.
    async fn notify(
        notifier: Option<Arc<dyn NotificationSender>>,
        address: Option<String>,
        execution_id: &str,
        outcome: ExecutionOutcome,
    ) {
        let (Some(notifier), Some(address)) = (notifier, address) else {
            return;
        };
        if let Err(e) = notifier.notify(&address, execution_id, &outcome).await {
            tracing::warn!(execution_id, to = address, error = %e, "Notification not delivered");
        }
    }
}
