//! Cluster coordination for the tellus execution engine.
//!
//! - [`identity`]: stable per-node cluster id.
//! - [`ClusterPropagator`]: ownership resolution and write-through
//!   fan-out of status mutations to every registered store.
//! - [`RemoteStatus`]: store-backed proxy for executions owned by
//!   another node.
//! - [`ResultPublisher`]: converts local artifacts into externally
//!   reachable references before storage.

pub mod identity;
pub mod propagator;
pub mod publish;
pub mod remote;

pub use identity::{node_cluster_id, CLUSTER_ID_ENV};
pub use propagator::ClusterPropagator;
pub use publish::{LocalPathPublisher, PublishError, ResultPublisher, ResultValue};
pub use remote::RemoteStatus;
