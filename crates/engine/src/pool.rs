//! Bounded worker pools for process execution.
//!
//! A [`WorkerPool`] admits any number of submissions but caps how many run
//! at once with a semaphore. [`WorkerPool::submit`] spawns the task
//! immediately and hands back a [`TaskHandle`] the caller may await or
//! drop; dropping the handle does not cancel the task.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Semaphore};

/// Error returned by [`TaskHandle::wait`].
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The task did not finish within the requested wait.
    #[error("Timed out after {0:?} waiting for the task")]
    Timeout(Duration),

    /// The task panicked or was aborted before delivering its output.
    #[error("The task finished without producing an output")]
    TaskFailed,
}

/// Completion handle for a pooled task.
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait up to `timeout` for the task output.
    pub async fn wait(self, timeout: Duration) -> Result<T, WaitError> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(_)) => Err(WaitError::TaskFailed),
            Err(_) => Err(WaitError::Timeout(timeout)),
        }
    }
}

/// A named, semaphore-bounded pool of spawned tasks.
pub struct WorkerPool {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    submitted: AtomicU64,
}

impl WorkerPool {
    /// Create a pool running at most `size` tasks concurrently.
    /// A `size` of zero is treated as one.
    pub fn new(name: &'static str, size: usize) -> Self {
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(size.max(1))),
            submitted: AtomicU64::new(0),
        }
    }

    /// Spawn `task` onto the pool. The task waits for a permit before it
    /// starts executing, so at most `size` submissions make progress at a
    /// time.
    pub fn submit<F>(&self, task: F) -> TaskHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let semaphore = Arc::clone(&self.semaphore);
        let name = self.name;
        let (sender, receiver) = oneshot::channel();
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(pool = name, "Worker pool semaphore closed");
                    return;
                }
            };
            let output = task.await;
            // The caller may have dropped the handle; that is fine.
            let _ = sender.send(output);
        });
        TaskHandle { receiver }
    }

    /// Number of tasks submitted over the pool's lifetime.
    pub fn submitted_count(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Currently free execution slots.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn submit_runs_task_and_delivers_output() {
        let pool = WorkerPool::new("test", 2);
        let handle = pool.submit(async { 21 * 2 });
        let output = handle.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(output, 42);
        assert_eq!(pool.submitted_count(), 1);
    }

    #[tokio::test]
    async fn pool_bounds_concurrency() {
        let pool = WorkerPool::new("test", 1);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(pool.submit(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.wait(Duration::from_secs(5)).await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(pool.submitted_count(), 4);
    }

    #[tokio::test]
    async fn wait_times_out_on_slow_task() {
        let pool = WorkerPool::new("test", 1);
        let handle = pool.submit(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let result = handle.wait(Duration::from_millis(10)).await;
        assert_matches!(result, Err(WaitError::Timeout(_)));
    }

    #[tokio::test]
    async fn zero_size_pool_still_runs_tasks() {
        let pool = WorkerPool::new("test", 0);
        let handle = pool.submit(async { "ok" });
        assert_eq!(handle.wait(Duration::from_secs(1)).await.unwrap(), "ok");
    }
}
