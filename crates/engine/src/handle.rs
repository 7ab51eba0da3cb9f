//! The live, node-local view of an execution.
//!
//! An [`ExecutionHandle`] wraps the status record of an execution owned
//! by this node. Every mutation goes through [`ExecutionHandle::apply`],
//! which holds the record lock across both the local transition and the
//! cluster write-through, so no reader anywhere can observe the record
//! mid-mutation. Phase changes are additionally published on a watch
//! channel so local waiters block without polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tellus_cluster::ClusterPropagator;
use tellus_core::{CoreError, ExecutionStatus, Phase};
use tokio::sync::{watch, Mutex};

use crate::error::EngineError;

/// Handle to an execution owned by this node.
pub struct ExecutionHandle {
    status: Mutex<ExecutionStatus>,
    cancel_requested: AtomicBool,
    phase_tx: watch::Sender<Phase>,
}

impl ExecutionHandle {
    /// Wrap a fresh status record.
    pub fn new(status: ExecutionStatus) -> Arc<Self> {
        let (phase_tx, _) = watch::channel(status.phase);
        Arc::new(Self {
            status: Mutex::new(status),
            cancel_requested: AtomicBool::new(false),
            phase_tx,
        })
    }

    /// A point-in-time copy of the record.
    pub async fn snapshot(&self) -> ExecutionStatus {
        self.status.lock().await.clone()
    }

    /// Raise the cooperative cancellation flag. The running process
    /// observes it through its listener on its next poll; nothing is
    /// interrupted preemptively.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Subscribe to phase changes.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Mutate the record and write it through to every store.
    ///
    /// The record lock is held until the stores have been written, so the
    /// write-through ordering guarantee holds: once this returns, any
    /// store-backed reader observes the new state. A failed local
    /// transition (an invariant violation) is returned without touching
    /// the stores; a failed authoritative store write is returned after
    /// the local transition has already taken effect.
    pub async fn apply<F>(
        &self,
        propagator: &ClusterPropagator,
        mutate: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&mut ExecutionStatus) -> Result<(), CoreError>,
    {
        let mut status = self.status.lock().await;
        mutate(&mut status)?;
        let snapshot = status.clone();
        let written = propagator.write_through(&snapshot).await;
        drop(status);

        self.phase_tx.send_if_modified(|current| {
            if *current == snapshot.phase {
                false
            } else {
                *current = snapshot.phase;
                true
            }
        });

        written.map_err(EngineError::from)
    }

    /// Block until the execution reaches a terminal phase, or `timeout`
    /// elapses.
    pub async fn wait_terminal(&self, timeout: Duration) -> Result<Phase, EngineError> {
        let mut rx = self.phase_tx.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|p| p.is_terminal())).await;
        match waited {
            Ok(Ok(phase)) => Ok(*phase),
            // The sender lives as long as the handle, so a closed channel
            // means the handle itself is gone.
            Ok(Err(_)) => Err(EngineError::StoreInconsistency(
                "Execution handle dropped while awaiting a terminal phase".to_string(),
            )),
            Err(_) => Err(EngineError::Timeout(timeout)),
        }
    }
}
