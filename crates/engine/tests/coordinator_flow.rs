//! End-to-end coordinator flows over an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;
use tellus_cluster::ClusterPropagator;
use tellus_core::{
    CoreError, ExecutionListener, Phase, Process, ProcessData, ProcessError, ProcessName,
    ProcessOutput, StaticProcessRegistry,
};
use tellus_engine::{Coordinator, EngineConfig, EngineError};
use tellus_store::{InMemoryStatusStore, ProcessDescriptor, StatusStore};

const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Stub processes
// ---------------------------------------------------------------------------

/// Copies its inputs to its outputs, reporting progress along the way.
struct EchoProcess;

#[async_trait]
impl Process for EchoProcess {
    async fn execute(
        &self,
        inputs: &ProcessData,
        listener: &dyn ExecutionListener,
    ) -> Result<ProcessOutput, ProcessError> {
        listener.progress(50.0).await;
        listener.complete().await;
        Ok(ProcessOutput::new(inputs.clone()))
    }
}

/// Always raises.
struct FailingProcess;

#[async_trait]
impl Process for FailingProcess {
    async fn execute(
        &self,
        _inputs: &ProcessData,
        listener: &dyn ExecutionListener,
    ) -> Result<ProcessOutput, ProcessError> {
        listener.exception_occurred("boom").await;
        Err(ProcessError::Failure("boom".to_string()))
    }
}

/// Loops until the cooperative cancellation flag is observed.
struct CancelAwareProcess;

#[async_trait]
impl Process for CancelAwareProcess {
    async fn execute(
        &self,
        _inputs: &ProcessData,
        listener: &dyn ExecutionListener,
    ) -> Result<ProcessOutput, ProcessError> {
        for tick in 0..500 {
            if listener.is_canceled() {
                return Err(ProcessError::Cancelled);
            }
            listener.progress(tick as f32 / 5.0).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(ProcessOutput::new(ProcessData::new()))
    }
}

/// Never finishes within a test's patience.
struct StuckProcess;

#[async_trait]
impl Process for StuckProcess {
    async fn execute(
        &self,
        _inputs: &ProcessData,
        _listener: &dyn ExecutionListener,
    ) -> Result<ProcessOutput, ProcessError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(ProcessOutput::new(ProcessData::new()))
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn name(local: &str) -> ProcessName {
    ProcessName::new("test", local).unwrap()
}

fn inputs(pairs: &[(&str, &str)]) -> ProcessData {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect()
}

fn engine() -> (Arc<Coordinator>, Arc<InMemoryStatusStore>) {
    let store = Arc::new(InMemoryStatusStore::new());
    let propagator = Arc::new(ClusterPropagator::new(
        "node-a".to_string(),
        vec![store.clone() as Arc<dyn StatusStore>],
        Vec::new(),
    ));

    let mut registry = StaticProcessRegistry::new();
    registry.register(&name("echo"), Arc::new(EchoProcess));
    registry.register(&name("fail"), Arc::new(FailingProcess));
    registry.register(&name("cancelable"), Arc::new(CancelAwareProcess));
    registry.register(&name("stuck"), Arc::new(StuckProcess));

    let coordinator = Coordinator::new(
        Arc::new(registry),
        propagator,
        None,
        &EngineConfig::default(),
    );
    (Arc::new(coordinator), store)
}

// ---------------------------------------------------------------------------
// Submission and retrieval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_execution_delivers_outputs_and_final_record() {
    let (coordinator, store) = engine();
    coordinator
        .submit("e1".to_string(), &name("echo"), inputs(&[("k", "v")]), false)
        .await
        .unwrap();

    let output = coordinator.get_output("e1", WAIT, false).await.unwrap().unwrap();
    assert_eq!(output.get("k"), Some(&json!("v")));

    let stored = store.get("node-a", "e1", false).await.unwrap().unwrap();
    assert_eq!(stored.phase, Phase::Completed.id());
    assert_eq!(stored.progress, 100.0);
}

#[tokio::test]
async fn failed_execution_raises_and_records_the_reason() {
    let (coordinator, store) = engine();
    coordinator
        .submit("e1".to_string(), &name("fail"), ProcessData::new(), false)
        .await
        .unwrap();

    let err = coordinator.get_output("e1", WAIT, false).await.unwrap_err();
    assert_matches!(err, EngineError::ProcessFailure(reason) if reason == "boom");

    let stored = store.get("node-a", "e1", false).await.unwrap().unwrap();
    assert_eq!(stored.phase, Phase::Failed.id());
    assert_eq!(stored.result.as_deref(), Some("boom"));
}

#[tokio::test]
async fn cancellation_is_cooperative_and_terminal() {
    let (coordinator, store) = engine();
    coordinator
        .submit(
            "e1".to_string(),
            &name("cancelable"),
            ProcessData::new(),
            false,
        )
        .await
        .unwrap();

    // Let the process take at least one loop iteration before cancelling.
    tokio::time::sleep(Duration::from_millis(30)).await;
    coordinator.cancel("e1").await.unwrap();

    let err = coordinator.get_output("e1", WAIT, false).await.unwrap_err();
    assert_matches!(err, EngineError::Cancelled);

    let stored = store.get("node-a", "e1", false).await.unwrap().unwrap();
    assert_eq!(stored.phase, Phase::Cancelled.id());
}

#[tokio::test]
async fn unknown_process_fails_before_any_record_or_pool_slot() {
    let (coordinator, store) = engine();
    let err = coordinator
        .submit("e1".to_string(), &name("ghost"), ProcessData::new(), false)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::UnknownProcess(_));

    assert_eq!(coordinator.submitted_counts(), (0, 0));
    assert!(store.get("node-a", "e1", true).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_execution_id_is_rejected() {
    let (coordinator, _store) = engine();
    coordinator
        .submit("e1".to_string(), &name("echo"), ProcessData::new(), false)
        .await
        .unwrap();

    let err = coordinator
        .submit("e1".to_string(), &name("echo"), ProcessData::new(), false)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn concurrent_submissions_of_one_id_admit_exactly_one() {
    use tellus_cluster::ClusterPropagator as Propagator;
    use tellus_core::{ClusterId, Phase as CorePhase};
    use tellus_store::{ProcessDescriptor as Descriptor, StatusQuery, StoreError};

    /// In-memory store whose ownership lookup takes a while, widening
    /// any check-then-insert window in the submission path.
    struct SlowOwnerStore {
        inner: InMemoryStatusStore,
    }

    #[async_trait]
    impl StatusStore for SlowOwnerStore {
        async fn put(&self, d: Descriptor) -> Result<(), StoreError> {
            self.inner.put(d).await
        }
        async fn get(
            &self,
            c: &str,
            e: &str,
            lenient: bool,
        ) -> Result<Option<Descriptor>, StoreError> {
            self.inner.get(c, e, lenient).await
        }
        async fn get_all(&self, q: &StatusQuery) -> Result<Vec<Descriptor>, StoreError> {
            self.inner.get_all(q).await
        }
        async fn remove(
            &self,
            c: &str,
            e: &str,
            lenient: bool,
        ) -> Result<Option<Descriptor>, StoreError> {
            self.inner.remove(c, e, lenient).await
        }
        async fn update_phase(
            &self,
            c: &str,
            e: &str,
            p: CorePhase,
            lenient: bool,
        ) -> Result<(), StoreError> {
            self.inner.update_phase(c, e, p, lenient).await
        }
        async fn update_progress(
            &self,
            c: &str,
            e: &str,
            p: f32,
            lenient: bool,
        ) -> Result<(), StoreError> {
            self.inner.update_progress(c, e, p, lenient).await
        }
        async fn get_owner(
            &self,
            e: &str,
            lenient: bool,
        ) -> Result<Option<ClusterId>, StoreError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.get_owner(e, lenient).await
        }
        async fn store_result(
            &self,
            c: &str,
            e: &str,
            r: &str,
            lenient: bool,
        ) -> Result<(), StoreError> {
            self.inner.store_result(c, e, r, lenient).await
        }
    }

    let store = Arc::new(SlowOwnerStore {
        inner: InMemoryStatusStore::new(),
    });
    let propagator = Arc::new(Propagator::new(
        "node-a".to_string(),
        vec![store as Arc<dyn StatusStore>],
        Vec::new(),
    ));
    let mut registry = StaticProcessRegistry::new();
    registry.register(&name("echo"), Arc::new(EchoProcess));
    let coordinator = Arc::new(Coordinator::new(
        Arc::new(registry),
        propagator,
        None,
        &EngineConfig::default(),
    ));

    let submissions: Vec<_> = (0..2)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .submit("dup".to_string(), &name("echo"), ProcessData::new(), false)
                    .await
            })
        })
        .collect();

    let mut accepted = 0;
    for task in submissions {
        match task.await.unwrap() {
            Ok(()) => accepted += 1,
            Err(err) => assert_matches!(err, EngineError::Core(CoreError::Conflict(_))),
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn cancel_of_unknown_execution_reports_not_found() {
    let (coordinator, _store) = engine();
    assert_matches!(
        coordinator.cancel("ghost").await,
        Err(EngineError::NotFound(_))
    );
}

// ---------------------------------------------------------------------------
// Output retrieval edge cases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_output_times_out_on_a_stuck_execution() {
    let (coordinator, _store) = engine();
    coordinator
        .submit("e1".to_string(), &name("stuck"), ProcessData::new(), false)
        .await
        .unwrap();

    let err = coordinator
        .get_output("e1", Duration::from_millis(50), false)
        .await
        .unwrap_err();
    // The timeout path is not softened by leniency.
    assert_matches!(err, EngineError::Timeout(_));
    let err = coordinator
        .get_output("e1", Duration::from_millis(50), true)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Timeout(_));
}

#[tokio::test]
async fn get_output_for_unknown_execution_honors_leniency() {
    let (coordinator, _store) = engine();
    assert_matches!(
        coordinator.get_output("ghost", WAIT, false).await,
        Err(EngineError::NotFound(_))
    );
    assert!(coordinator
        .get_output("ghost", WAIT, true)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Status lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_status_prefers_the_local_handle() {
    let (coordinator, _store) = engine();
    coordinator
        .submit("e1".to_string(), &name("stuck"), ProcessData::new(), false)
        .await
        .unwrap();

    let view = coordinator.get_status("e1").await.unwrap();
    assert!(view.is_local());
    let snapshot = view.snapshot().await.unwrap();
    assert_eq!(snapshot.execution_id, "e1");
}

#[tokio::test]
async fn get_status_falls_back_to_remote_records() {
    let (coordinator, store) = engine();

    // A record owned by another node, visible through the shared store.
    let remote = tellus_core::ExecutionStatus::new(
        "remote-1".to_string(),
        name("echo"),
        "node-b".to_string(),
    );
    store
        .put(ProcessDescriptor::from_status(&remote).unwrap())
        .await
        .unwrap();

    let view = coordinator.get_status("remote-1").await.unwrap();
    assert!(!view.is_local());
    let snapshot = view.snapshot().await.unwrap();
    assert_eq!(snapshot.cluster_id, "node-b");

    assert_matches!(
        coordinator.get_status("ghost").await,
        Err(EngineError::NotFound(_))
    );
}

#[tokio::test]
async fn remote_output_is_retrieved_by_polling_the_store() {
    let (coordinator, store) = engine();

    let mut remote = tellus_core::ExecutionStatus::new(
        "remote-1".to_string(),
        name("echo"),
        "node-b".to_string(),
    );
    remote.set_phase(Phase::Running).unwrap();
    store
        .put(ProcessDescriptor::from_status(&remote).unwrap())
        .await
        .unwrap();

    // The owning node completes the record while this node waits.
    let writer = {
        let store = store.clone();
        let mut finished = remote.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            finished
                .complete(inputs(&[("answer", "42")]), None)
                .unwrap();
            store
                .put(ProcessDescriptor::from_status(&finished).unwrap())
                .await
                .unwrap();
        })
    };

    let output = coordinator
        .get_output("remote-1", WAIT, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(output.get("answer"), Some(&json!("42")));
    writer.await.unwrap();
}

// ---------------------------------------------------------------------------
// Write-through visibility
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submission_is_visible_in_the_store_before_submit_returns() {
    let (coordinator, store) = engine();
    coordinator
        .submit("e1".to_string(), &name("stuck"), ProcessData::new(), false)
        .await
        .unwrap();

    // No waiting: the Queued row must already be there.
    let stored = store.get("node-a", "e1", false).await.unwrap().unwrap();
    assert!(stored.phase == Phase::Queued.id() || stored.phase == Phase::Running.id());
}

#[tokio::test]
async fn progress_reports_reach_the_store_while_running() {
    let (coordinator, store) = engine();
    coordinator
        .submit(
            "e1".to_string(),
            &name("cancelable"),
            ProcessData::new(),
            false,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stored = store.get("node-a", "e1", false).await.unwrap().unwrap();
    assert_eq!(stored.phase, Phase::Running.id());
    assert!(stored.progress > 0.0);

    coordinator.cancel("e1").await.unwrap();
    let _ = coordinator.get_output("e1", WAIT, false).await;
}

// ---------------------------------------------------------------------------
// Chained execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chained_execution_runs_inline_without_a_pool_slot() {
    let (coordinator, store) = engine();

    let output = coordinator
        .submit_chained("child-1".to_string(), &name("echo"), inputs(&[("k", "v")]))
        .await
        .unwrap();
    assert_eq!(output.get("k"), Some(&json!("v")));

    // Inline means no pool traffic at all.
    assert_eq!(coordinator.submitted_counts(), (0, 0));

    // The child still got a full, tracked lifecycle.
    let stored = store.get("node-a", "child-1", false).await.unwrap().unwrap();
    assert_eq!(stored.phase, Phase::Completed.id());
}

#[tokio::test]
async fn chained_failure_propagates_to_the_caller() {
    let (coordinator, store) = engine();

    let err = coordinator
        .submit_chained("child-1".to_string(), &name("fail"), ProcessData::new())
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::ProcessFailure(reason) if reason == "boom");

    let stored = store.get("node-a", "child-1", false).await.unwrap().unwrap();
    assert_eq!(stored.phase, Phase::Failed.id());
}

// ---------------------------------------------------------------------------
// Pools and discard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn background_submissions_use_the_background_pool() {
    let (coordinator, _store) = engine();
    coordinator
        .submit("e1".to_string(), &name("echo"), ProcessData::new(), true)
        .await
        .unwrap();
    coordinator
        .submit("e2".to_string(), &name("echo"), ProcessData::new(), false)
        .await
        .unwrap();
    assert_eq!(coordinator.submitted_counts(), (1, 1));

    let _ = coordinator.get_output("e1", WAIT, false).await;
    let _ = coordinator.get_output("e2", WAIT, false).await;
}

#[tokio::test]
async fn discard_removes_the_record_everywhere() {
    let (coordinator, store) = engine();
    coordinator
        .submit("e1".to_string(), &name("echo"), ProcessData::new(), false)
        .await
        .unwrap();
    coordinator.get_output("e1", WAIT, false).await.unwrap();

    coordinator.discard("e1").await.unwrap();
    assert!(store.get("node-a", "e1", true).await.unwrap().is_none());
    assert_matches!(
        coordinator.get_status("e1").await,
        Err(EngineError::NotFound(_))
    );
}
