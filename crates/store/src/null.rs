//! No-op status store.
//!
//! Used when no cluster-wide persistence is configured: every write
//! succeeds and every read answers "nothing here", which degrades the
//! engine to single-node, in-memory behavior without changing any
//! coordinator logic. Because nothing is ever expected to exist in this
//! store, absence is never an inconsistency and the `lenient` flag is
//! irrelevant.

use async_trait::async_trait;
use tellus_core::{ClusterId, Phase};

use crate::descriptor::{ProcessDescriptor, StatusQuery};
use crate::error::StoreError;
use crate::store::StatusStore;

/// Pure pass-through store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatusStore;

#[async_trait]
impl StatusStore for NullStatusStore {
    fn priority(&self) -> i32 {
        i32::MIN
    }

    async fn put(&self, _descriptor: ProcessDescriptor) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(
        &self,
        _cluster_id: &str,
        _execution_id: &str,
        _lenient: bool,
    ) -> Result<Option<ProcessDescriptor>, StoreError> {
        Ok(None)
    }

    async fn get_all(&self, _query: &StatusQuery) -> Result<Vec<ProcessDescriptor>, StoreError> {
        Ok(Vec::new())
    }

    async fn remove(
        &self,
        _cluster_id: &str,
        _execution_id: &str,
        _lenient: bool,
    ) -> Result<Option<ProcessDescriptor>, StoreError> {
        Ok(None)
    }

    async fn update_phase(
        &self,
        _cluster_id: &str,
        _execution_id: &str,
        _phase: Phase,
        _lenient: bool,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn update_progress(
        &self,
        _cluster_id: &str,
        _execution_id: &str,
        _progress: f32,
        _lenient: bool,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_owner(
        &self,
        _execution_id: &str,
        _lenient: bool,
    ) -> Result<Option<ClusterId>, StoreError> {
        Ok(None)
    }

    async fn store_result(
        &self,
        _cluster_id: &str,
        _execution_id: &str,
        _result: &str,
        _lenient: bool,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_output(
        &self,
        _cluster_id: &str,
        _execution_id: &str,
        _timeout: std::time::Duration,
        _lenient: bool,
    ) -> Result<Option<tellus_core::ProcessData>, StoreError> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
