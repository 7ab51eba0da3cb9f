//! The listener handed to a running process.
//!
//! [`StatusListener`] binds a process to its [`ExecutionHandle`]: progress
//! reports flow through the handle's write-through path, and cancellation
//! polling reads the handle's cooperative flag. A listener never raises
//! into the process; record-update failures are logged and swallowed so a
//! flaky store cannot take down a healthy execution.

use std::sync::Arc;

use async_trait::async_trait;
use tellus_cluster::ClusterPropagator;
use tellus_core::ExecutionListener;
use tokio::sync::Mutex;

use crate::handle::ExecutionHandle;

/// Listener wired to one execution's handle and the cluster fan-out.
pub struct StatusListener {
    handle: Arc<ExecutionHandle>,
    propagator: Arc<ClusterPropagator>,
    last_exception: Mutex<Option<String>>,
}

impl StatusListener {
    pub fn new(handle: Arc<ExecutionHandle>, propagator: Arc<ClusterPropagator>) -> Self {
        Self {
            handle,
            propagator,
            last_exception: Mutex::new(None),
        }
    }

    /// The most recent message reported via `exception_occurred`, if any.
    pub async fn take_last_exception(&self) -> Option<String> {
        self.last_exception.lock().await.take()
    }
}

#[async_trait]
impl ExecutionListener for StatusListener {
    async fn progress(&self, percent: f32) {
        if let Err(e) = self
            .handle
            .apply(&self.propagator, |s| s.set_progress(percent))
            .await
        {
            tracing::warn!(percent, error = %e, "Progress report not recorded");
        }
    }

    fn is_canceled(&self) -> bool {
        self.handle.is_cancel_requested()
    }

    async fn exception_occurred(&self, message: &str) {
        tracing::warn!(message, "Process reported an exception");
        *self.last_exception.lock().await = Some(message.to_string());
    }

    async fn complete(&self) {
        self.progress(100.0).await;
    }
}

#[cfg(test)]
mod tests {
    use tellus_core::{ExecutionStatus, Phase, ProcessName};

    use super::*;

    fn listener() -> StatusListener {
        let status = ExecutionStatus::new(
            "e1".to_string(),
            ProcessName::new("geo", "clip").unwrap(),
            "node-a".to_string(),
        );
        let handle = ExecutionHandle::new(status);
        let propagator = Arc::new(ClusterPropagator::new(
            "node-a".to_string(),
            Vec::new(),
            Vec::new(),
        ));
        StatusListener::new(handle, propagator)
    }

    #[tokio::test]
    async fn progress_reaches_the_record() {
        let l = listener();
        l.handle
            .apply(&l.propagator, |s| s.set_phase(Phase::Running))
            .await
            .unwrap();
        l.progress(33.0).await;
        assert_eq!(l.handle.snapshot().await.progress, 33.0);
    }

    #[tokio::test]
    async fn complete_pushes_progress_to_hundred() {
        let l = listener();
        l.complete().await;
        assert_eq!(l.handle.snapshot().await.progress, 100.0);
    }

    #[tokio::test]
    async fn cancellation_flag_is_visible_through_the_listener() {
        let l = listener();
        assert!(!l.is_canceled());
        l.handle.request_cancel();
        assert!(l.is_canceled());
    }

    #[tokio::test]
    async fn exception_message_is_retained() {
        let l = listener();
        l.exception_occurred("disk full").await;
        assert_eq!(l.take_last_exception().await.as_deref(), Some("disk full"));
        assert!(l.take_last_exception().await.is_none());
    }
}
