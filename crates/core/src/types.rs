//! Shared primitive type aliases used across the tellus workspace.

/// Storage-local identifiers are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Globally unique identifier for one submission, for its entire lifetime.
///
/// May be supplied by the caller or generated via [`new_execution_id`].
pub type ExecutionId = String;

/// Stable identity of one cluster node.
pub type ClusterId = String;

/// Named process inputs and outputs.
pub type ProcessData = serde_json::Map<String, serde_json::Value>;

/// Generate a fresh execution id (UUIDv7, time-ordered).
pub fn new_execution_id() -> ExecutionId {
    uuid::Uuid::now_v7().to_string()
}
