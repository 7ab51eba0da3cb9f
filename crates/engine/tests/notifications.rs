//! Terminal-outcome notification flows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tellus_cluster::ClusterPropagator;
use tellus_core::{
    ExecutionListener, Process, ProcessData, ProcessError, ProcessName, ProcessOutput,
    StaticProcessRegistry,
};
use tellus_engine::{Coordinator, EngineConfig, NOTIFY_INPUT_KEY};
use tellus_events::{ExecutionOutcome, NotificationSender, NotifyError};
use tellus_store::{InMemoryStatusStore, StatusStore};
use tokio::sync::Mutex;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, String, ExecutionOutcome)>>,
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn notify(
        &self,
        address: &str,
        execution_id: &str,
        outcome: &ExecutionOutcome,
    ) -> Result<(), NotifyError> {
        self.sent.lock().await.push((
            address.to_string(),
            execution_id.to_string(),
            outcome.clone(),
        ));
        Ok(())
    }
}

/// Delivery always fails; executions must not care.
struct BrokenSender;

#[async_trait]
impl NotificationSender for BrokenSender {
    async fn notify(
        &self,
        _address: &str,
        _execution_id: &str,
        _outcome: &ExecutionOutcome,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp down".to_string()))
    }
}

struct EchoProcess;

#[async_trait]
impl Process for EchoProcess {
    async fn execute(
        &self,
        inputs: &ProcessData,
        _listener: &dyn ExecutionListener,
    ) -> Result<ProcessOutput, ProcessError> {
        Ok(ProcessOutput::new(inputs.clone()))
    }
}

struct FailingProcess;

#[async_trait]
impl Process for FailingProcess {
    async fn execute(
        &self,
        _inputs: &ProcessData,
        _listener: &dyn ExecutionListener,
    ) -> Result<ProcessOutput, ProcessError> {
        Err(ProcessError::Failure("boom".to_string()))
    }
}

fn name(local: &str) -> ProcessName {
    ProcessName::new("test", local).unwrap()
}

fn engine(sender: Arc<dyn NotificationSender>) -> Coordinator {
    let store = Arc::new(InMemoryStatusStore::new());
    let propagator = Arc::new(ClusterPropagator::new(
        "node-a".to_string(),
        vec![store as Arc<dyn StatusStore>],
        Vec::new(),
    ));
    let mut registry = StaticProcessRegistry::new();
    registry.register(&name("echo"), Arc::new(EchoProcess));
    registry.register(&name("fail"), Arc::new(FailingProcess));
    Coordinator::new(
        Arc::new(registry),
        propagator,
        Some(sender),
        &EngineConfig::default(),
    )
}

fn inputs_with_address() -> ProcessData {
    let mut inputs = ProcessData::new();
    inputs.insert(NOTIFY_INPUT_KEY.to_string(), json!("ops@example.com"));
    inputs
}

#[tokio::test]
async fn completion_notifies_the_requested_address() {
    let sender = Arc::new(RecordingSender::default());
    let coordinator = engine(sender.clone());

    coordinator
        .submit("e1".to_string(), &name("echo"), inputs_with_address(), false)
        .await
        .unwrap();
    coordinator.get_output("e1", WAIT, false).await.unwrap();

    // The notification task races with get_output's wake-up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let sent = sender.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ops@example.com");
    assert_eq!(sent[0].1, "e1");
    assert!(matches!(sent[0].2, ExecutionOutcome::Completed { .. }));
}

#[tokio::test]
async fn failure_notifies_with_the_recorded_reason() {
    let sender = Arc::new(RecordingSender::default());
    let coordinator = engine(sender.clone());

    coordinator
        .submit("e1".to_string(), &name("fail"), inputs_with_address(), false)
        .await
        .unwrap();
    let _ = coordinator.get_output("e1", WAIT, false).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let sent = sender.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        &sent[0].2,
        ExecutionOutcome::Failed { reason } if reason == "boom"
    ));
}

#[tokio::test]
async fn no_address_means_no_notification() {
    let sender = Arc::new(RecordingSender::default());
    let coordinator = engine(sender.clone());

    coordinator
        .submit("e1".to_string(), &name("echo"), ProcessData::new(), false)
        .await
        .unwrap();
    coordinator.get_output("e1", WAIT, false).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sender.sent.lock().await.is_empty());
}

#[tokio::test]
async fn delivery_failure_does_not_fail_the_execution() {
    let coordinator = engine(Arc::new(BrokenSender));

    coordinator
        .submit("e1".to_string(), &name("echo"), inputs_with_address(), false)
        .await
        .unwrap();
    // Output retrieval succeeds even though the notification never went out.
    assert!(coordinator.get_output("e1", WAIT, false).await.is_ok());
}
