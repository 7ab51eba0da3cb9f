//! In-memory status store.
//!
//! The default home store on every node: a map keyed by
//! `(cluster_id, execution_id)` behind an async `RwLock`. Highest priority
//! so that local reads never touch a slower backend when this store holds
//! the record.

use std::collections::HashMap;

use async_trait::async_trait;
use tellus_core::{ClusterId, Phase};
use tokio::sync::RwLock;

use crate::descriptor::{ProcessDescriptor, StatusQuery};
use crate::error::StoreError;
use crate::store::StatusStore;

/// Priority of the in-memory store (home read path).
pub const MEMORY_STORE_PRIORITY: i32 = 100;

/// Map-backed store, one entry per (cluster, execution).
#[derive(Default)]
pub struct InMemoryStatusStore {
    records: RwLock<HashMap<(ClusterId, String), ProcessDescriptor>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn key(cluster_id: &str, execution_id: &str) -> (String, String) {
        (cluster_id.to_string(), execution_id.to_string())
    }

    /// Shared read-modify-write used by the narrow mutators.
    async fn modify(
        &self,
        cluster_id: &str,
        execution_id: &str,
        lenient: bool,
        mutate: impl FnOnce(&mut tellus_core::ExecutionStatus) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&Self::key(cluster_id, execution_id)) {
            Some(descriptor) => descriptor.modify_status(mutate),
            None if lenient => Ok(()),
            None => Err(StoreError::NotFound(execution_id.to_string())),
        }
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    fn priority(&self) -> i32 {
        MEMORY_STORE_PRIORITY
    }

    async fn put(&self, descriptor: ProcessDescriptor) -> Result<(), StoreError> {
        let key = Self::key(&descriptor.cluster_id, &descriptor.execution_id);
        self.records.write().await.insert(key, descriptor);
        Ok(())
    }

    async fn get(
        &self,
        cluster_id: &str,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ProcessDescriptor>, StoreError> {
        let records = self.records.read().await;
        match records.get(&Self::key(cluster_id, execution_id)) {
            Some(descriptor) => Ok(Some(descriptor.clone())),
            None if lenient => Ok(None),
            None => Err(StoreError::NotFound(execution_id.to_string())),
        }
    }

    async fn get_all(&self, query: &StatusQuery) -> Result<Vec<ProcessDescriptor>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect())
    }

    async fn remove(
        &self,
        cluster_id: &str,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ProcessDescriptor>, StoreError> {
        let removed = self
            .records
            .write()
            .await
            .remove(&Self::key(cluster_id, execution_id));
        match removed {
            Some(descriptor) => Ok(Some(descriptor)),
            None if lenient => Ok(None),
            None => Err(StoreError::NotFound(execution_id.to_string())),
        }
    }

    async fn update_phase(
        &self,
        cluster_id: &str,
        execution_id: &str,
        phase: Phase,
        lenient: bool,
    ) -> Result<(), StoreError> {
        self.modify(cluster_id, execution_id, lenient, |status| {
            Ok(status.set_phase(phase)?)
        })
        .await
    }

    async fn update_progress(
        &self,
        cluster_id: &str,
        execution_id: &str,
        progress: f32,
        lenient: bool,
    ) -> Result<(), StoreError> {
        self.modify(cluster_id, execution_id, lenient, |status| {
            Ok(status.set_progress(progress)?)
        })
        .await
    }

    async fn get_owner(
        &self,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ClusterId>, StoreError> {
        let records = self.records.read().await;
        let owner = records
            .values()
            .find(|d| d.execution_id == execution_id)
            .map(|d| d.cluster_id.clone());
        match owner {
            Some(cluster_id) => Ok(Some(cluster_id)),
            None if lenient => Ok(None),
            None => Err(StoreError::NotFound(execution_id.to_string())),
        }
    }

    async fn store_result(
        &self,
        cluster_id: &str,
        execution_id: &str,
        result: &str,
        lenient: bool,
    ) -> Result<(), StoreError> {
        let value = result.to_string();
        self.modify(cluster_id, execution_id, lenient, move |status| {
            status.result = Some(value);
            Ok(())
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
