//! Cluster node identity.
//!
//! Every node carries one stable cluster id for the lifetime of the
//! process: taken from configuration when provided, generated once at
//! startup otherwise.

use std::sync::OnceLock;

use tellus_core::ClusterId;

/// Environment variable carrying the configured node identity.
pub const CLUSTER_ID_ENV: &str = "TELLUS_CLUSTER_ID";

static NODE_ID: OnceLock<ClusterId> = OnceLock::new();

/// The stable cluster id of this node.
///
/// Resolved once: the value of `TELLUS_CLUSTER_ID` if set, else a
/// generated UUIDv4. Every later call returns the same id.
pub fn node_cluster_id() -> ClusterId {
    NODE_ID
        .get_or_init(|| {
            std::env::var(CLUSTER_ID_ENV)
                .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
        })
        .clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
