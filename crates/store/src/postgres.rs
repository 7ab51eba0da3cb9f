//! Durable status store backed by PostgreSQL.
//!
//! One row per (cluster, execution) in the `execution_statuses` table;
//! the full status record travels as an opaque JSONB snapshot next to the
//! narrow columns the lookups need. Narrow mutators are literal
//! read-modify-write cycles (`SELECT ... FOR UPDATE` + `UPDATE`) so the
//! state-machine invariants are enforced on the decoded record, not
//! re-implemented in SQL.

use async_trait::async_trait;
use sqlx::PgPool;
use tellus_core::{ClusterId, ExecutionStatus, Phase};

use crate::descriptor::{ProcessDescriptor, StatusQuery};
use crate::error::StoreError;
use crate::store::StatusStore;

/// Column list for `execution_statuses` queries.
const COLUMNS: &str = "\
    id, cluster_id, execution_id, phase, serialized_status, \
    progress, result, created_at, updated_at";

/// Durable, cluster-shared status store.
pub struct PgStatusStore {
    pool: PgPool,
    priority: i32,
}

impl PgStatusStore {
    /// Create a store over an existing pool, at priority 0.
    pub fn new(pool: PgPool) -> Self {
        Self { pool, priority: 0 }
    }

    /// Override the store priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Run the bundled migrations for this store's table.
    pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("Running execution status store migrations");
        sqlx::migrate!("./migrations").run(pool).await
    }

    /// Shared read-modify-write used by the narrow mutators.
    async fn modify(
        &self,
        cluster_id: &str,
        execution_id: &str,
        lenient: bool,
        mutate: impl FnOnce(&mut ExecutionStatus) -> Result<(), StoreError> + Send,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT {COLUMNS} FROM execution_statuses \
             WHERE cluster_id = $1 AND execution_id = $2 \
             FOR UPDATE"
        );
        let row: Option<ProcessDescriptor> = sqlx::query_as(&query)
            .bind(cluster_id)
            .bind(execution_id)
            .fetch_optional(&mut *tx)
            .await?;

        let mut descriptor = match row {
            Some(d) => d,
            None if lenient => {
                tracing::debug!(
                    cluster_id,
                    execution_id,
                    "Lenient update against a missing row, skipping"
                );
                return Ok(());
            }
            None => return Err(StoreError::NotFound(execution_id.to_string())),
        };
        descriptor.modify_status(mutate)?;

        sqlx::query(
            "UPDATE execution_statuses \
             SET phase = $3, serialized_status = $4, progress = $5, \
                 result = $6, updated_at = $7 \
             WHERE cluster_id = $1 AND execution_id = $2",
        )
        .bind(cluster_id)
        .bind(execution_id)
        .bind(descriptor.phase)
        .bind(&descriptor.serialized_status)
        .bind(descriptor.progress)
        .bind(&descriptor.result)
        .bind(descriptor.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Build the WHERE clause for a [`StatusQuery`].
///
/// Bind order is fixed: phase ordinals array, progress floor, cluster id,
/// age cutoff; each present only when the query carries it.
fn build_where_clause(query: &StatusQuery) -> String {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx: u32 = 1;

    match (query.phases.is_empty(), query.or_progress_at_least) {
        (true, None) => {}
        (false, None) => {
            conditions.push(format!("phase = ANY(${bind_idx})"));
            bind_idx += 1;
        }
        (true, Some(_)) => {
            conditions.push(format!("progress >= ${bind_idx}"));
            bind_idx += 1;
        }
        (false, Some(_)) => {
            conditions.push(format!(
                "(phase = ANY(${}) OR progress >= ${})",
                bind_idx,
                bind_idx + 1
            ));
            bind_idx += 2;
        }
    }

    if query.cluster_id.is_some() {
        conditions.push(format!("cluster_id = ${bind_idx}"));
        bind_idx += 1;
    }

    if query.older_than.is_some() {
        conditions.push(format!("updated_at < ${bind_idx}"));
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    fn priority(&self) -> i32 {
        self.priority
    }

    async fn put(&self, descriptor: ProcessDescriptor) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO execution_statuses \
                 (cluster_id, execution_id, phase, serialized_status, \
                  progress, result, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (cluster_id, execution_id) DO UPDATE \
             SET phase = EXCLUDED.phase, \
                 serialized_status = EXCLUDED.serialized_status, \
                 progress = EXCLUDED.progress, \
                 result = EXCLUDED.result, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(&descriptor.cluster_id)
        .bind(&descriptor.execution_id)
        .bind(descriptor.phase)
        .bind(&descriptor.serialized_status)
        .bind(descriptor.progress)
        .bind(&descriptor.result)
        .bind(descriptor.created_at)
        .bind(descriptor.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(
        &self,
        cluster_id: &str,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ProcessDescriptor>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM execution_statuses \
             WHERE cluster_id = $1 AND execution_id = $2"
        );
        let row: Option<ProcessDescriptor> = sqlx::query_as(&query)
            .bind(cluster_id)
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(descriptor) => Ok(Some(descriptor)),
            None if lenient => Ok(None),
            None => Err(StoreError::NotFound(execution_id.to_string())),
        }
    }

    async fn get_all(&self, query: &StatusQuery) -> Result<Vec<ProcessDescriptor>, StoreError> {
        let where_clause = build_where_clause(query);
        let sql = format!(
            "SELECT {COLUMNS} FROM execution_statuses \
             {where_clause} \
             ORDER BY updated_at ASC"
        );

        let mut q = sqlx::query_as::<_, ProcessDescriptor>(&sql);

        if !query.phases.is_empty() {
            let ordinals: Vec<i16> = query.phases.iter().map(|p| p.id()).collect();
            q = q.bind(ordinals);
        }
        if let Some(min) = query.or_progress_at_least {
            q = q.bind(min);
        }
        if let Some(cluster_id) = &query.cluster_id {
            q = q.bind(cluster_id);
        }
        if let Some(cutoff) = query.older_than {
            q = q.bind(cutoff);
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn remove(
        &self,
        cluster_id: &str,
        execution_id: &str,
        lenient: bool,
    ) -> Result<Option<ProcessDescriptor>, StoreError> {
        let query = format!(
            "DELETE FROM execution_statuses \
             WHERE cluster_id = $1 AND execution_id = $2 \
             RETURNING {COLUMNS}"
        );
        let row: Option<ProcessDescriptor> = sqlx::query_as(&query)
            .bind(cluster_id)
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
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
        let owner: Option<String> = sqlx::query_scalar(
            "SELECT cluster_id FROM execution_statuses \
             WHERE execution_id = $1 \
             ORDER BY updated_at DESC \
             LIMIT 1",
        )
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;
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
