//! The pluggable persistence/lookup contract for status records.
//!
//! Multiple stores may be registered at once, ordered by [`priority`]
//! (highest acts as the home read path; every store receives every
//! write). All lookups take a `lenient` flag: when `false`, absence of an
//! expected record is a genuine inconsistency and is reported as
//! [`StoreError::NotFound`]; when `true`, absence yields `None`.
//!
//! [`priority`]: StatusStore::priority

use std::time::Duration;

use async_trait::async_trait;
use tellus_core::{ClusterId, ExecutionId, Phase, ProcessData};

use crate::descriptor::{ProcessDescriptor, StatusQuery};
use crate::error::StoreError;

/// How often [`StatusStore::get_output`] re-reads a non-terminal record.
pub const OUTPUT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pluggable persistence and lookup backend for status records.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Ordering among registered stores; higher is consulted first on
    /// reads.
    fn priority(&self) -> i32 {
        0
    }

    /// Create or update the stored projection.
    async fn put(&self, descriptor: ProcessDescriptor) -> Result<(), StoreError>;

    /// Fetch one node's record for an execution.
    async fn get(
        &self,
        cluster_id: &str,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ProcessDescriptor>, StoreError>;

    /// List records matching `query`. Used by the janitor and by
    /// cross-cluster aggregation queries.
    async fn get_all(&self, query: &StatusQuery) -> Result<Vec<ProcessDescriptor>, StoreError>;

    /// Remove a record, returning the last stored projection.
    async fn remove(
        &self,
        cluster_id: &str,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ProcessDescriptor>, StoreError>;

    /// Narrow phase mutator, equivalent to read-modify-write of [`put`].
    /// State-machine invariants apply: an illegal transition is a
    /// [`StoreError::Core`] error.
    ///
    /// [`put`]: StatusStore::put
    async fn update_phase(
        &self,
        cluster_id: &str,
        execution_id: &str,
        phase: Phase,
        lenient: bool,
    ) -> Result<(), StoreError>;

    /// Narrow progress mutator, equivalent to read-modify-write of `put`.
    async fn update_progress(
        &self,
        cluster_id: &str,
        execution_id: &str,
        progress: f32,
        lenient: bool,
    ) -> Result<(), StoreError>;

    /// Resolve which node is authoritative for an execution id, regardless
    /// of which node asks.
    async fn get_owner(
        &self,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ClusterId>, StoreError>;

    /// Record a result reference. The value reaching the store is already
    /// externally publishable; large local artifacts are converted before
    /// fan-out, never copied into every backend.
    async fn store_result(
        &self,
        cluster_id: &str,
        execution_id: &str,
        result: &str,
        lenient: bool,
    ) -> Result<(), StoreError>;

    /// Advisory hook: a submission is about to be scheduled. Durable
    /// backends use this to pre-create the `Queued` row they will update
    /// later. Defaults to [`put`](StatusStore::put).
    async fn submit(&self, descriptor: ProcessDescriptor) -> Result<(), StoreError> {
        self.put(descriptor).await
    }

    /// Advisory hook for chained (inline) submissions. Defaults to
    /// [`put`](StatusStore::put).
    async fn submit_chained(&self, descriptor: ProcessDescriptor) -> Result<(), StoreError> {
        self.put(descriptor).await
    }

    /// Block (by polling) until the stored phase is terminal or `timeout`
    /// elapses.
    ///
    /// - `Completed` yields the decoded output map.
    /// - `Failed` raises [`StoreError::Failure`] with the recorded reason.
    /// - `Cancelled` raises [`StoreError::Cancelled`].
    /// - A missing record raises [`StoreError::NotFound`] immediately, or
    ///   yields `None` when `lenient`.
    /// - The deadline elapsing raises [`StoreError::Timeout`].
    async fn get_output(
        &self,
        cluster_id: &str,
        execution_id: &str,
        timeout: Duration,
        lenient: bool,
    ) -> Result<Option<ProcessData>, StoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let descriptor = match self.get(cluster_id, execution_id, true).await? {
                Some(d) => d,
                None if lenient => return Ok(None),
                None => return Err(StoreError::NotFound(execution_id.to_string())),
            };

            match descriptor.phase()? {
                Phase::Completed => {
                    let status = descriptor.into_status()?;
                    return Ok(Some(status.output.unwrap_or_default()));
                }
                Phase::Failed => {
                    let reason = descriptor
                        .result
                        .unwrap_or_else(|| "process failed".to_string());
                    return Err(StoreError::Failure(reason));
                }
                Phase::Cancelled => return Err(StoreError::Cancelled),
                Phase::Queued | Phase::Running => {}
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(StoreError::Timeout(timeout));
            }
            // The final window may be shorter than one poll interval; wait
            // it out and take one last read at the deadline.
            tokio::time::sleep(OUTPUT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
