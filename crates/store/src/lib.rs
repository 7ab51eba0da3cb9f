//! Pluggable status persistence for the tellus execution engine.
//!
//! - [`StatusStore`]: the persistence/lookup contract, with leniency
//!   semantics and a default polling [`get_output`](StatusStore::get_output).
//! - [`ProcessDescriptor`]: the stored projection of a status record.
//! - [`InMemoryStatusStore`]: the home store on every node.
//! - [`PgStatusStore`]: the durable, cluster-shared backend.
//! - [`NullStatusStore`]: pass-through used when no cluster persistence
//!   is configured.

use sqlx::postgres::PgPoolOptions;

pub mod descriptor;
pub mod error;
pub mod memory;
pub mod null;
pub mod postgres;
pub mod store;

pub use descriptor::{ProcessDescriptor, StatusQuery};
pub use error::StoreError;
pub use memory::InMemoryStatusStore;
pub use null::NullStatusStore;
pub use postgres::PgStatusStore;
pub use store::{StatusStore, OUTPUT_POLL_INTERVAL};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}
