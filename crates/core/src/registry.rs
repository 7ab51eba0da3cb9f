//! Process registry: resolves qualified names to invokable processes.
//!
//! The registry is an explicit, caller-constructed list; implementations
//! are registered at startup and passed into the coordinator, not
//! discovered through any ambient global lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::process::{Process, ProcessName};

/// Resolves a qualified process name to an invokable unit of work.
pub trait ProcessRegistry: Send + Sync {
    /// Look up a process; `None` means the name is unknown and any
    /// submission referencing it must fail before a pool slot is consumed.
    fn resolve(&self, name: &ProcessName) -> Option<Arc<dyn Process>>;
}

/// Fixed registry built once at startup.
#[derive(Default)]
pub struct StaticProcessRegistry {
    processes: HashMap<String, Arc<dyn Process>>,
}

impl StaticProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process under its qualified name, replacing any previous
    /// registration for the same name.
    pub fn register(&mut self, name: &ProcessName, process: Arc<dyn Process>) {
        self.processes.insert(name.qualified(), process);
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl ProcessRegistry for StaticProcessRegistry {
    fn resolve(&self, name: &ProcessName) -> Option<Arc<dyn Process>> {
        self.processes.get(&name.qualified()).cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::process::{ExecutionListener, ProcessError, ProcessOutput};
    use crate::types::ProcessData;

    struct NoopProcess;

    #[async_trait]
    impl Process for NoopProcess {
        async fn execute(
            &self,
            _inputs: &ProcessData,
            _listener: &dyn ExecutionListener,
        ) -> Result<ProcessOutput, ProcessError> {
            Ok(ProcessOutput::new(ProcessData::new()))
        }
    }

    #[test]
    fn resolve_registered_process() {
        let name = ProcessName::new("test", "noop").unwrap();
        let mut registry = StaticProcessRegistry::new();
        registry.register(&name, Arc::new(NoopProcess));

        assert!(registry.resolve(&name).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_unknown_name_returns_none() {
        let registry = StaticProcessRegistry::new();
        let name = ProcessName::new("test", "missing").unwrap();
        assert!(registry.resolve(&name).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn reregistering_replaces_previous_entry() {
        let name = ProcessName::new("test", "noop").unwrap();
        let mut registry = StaticProcessRegistry::new();
        registry.register(&name, Arc::new(NoopProcess));
        registry.register(&name, Arc::new(NoopProcess));
        assert_eq!(registry.len(), 1);
    }
}
