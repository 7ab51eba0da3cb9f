//! The execution engine: submission, lifecycle, and cleanup.
//!
//! - [`Coordinator`]: front door for submit, cancel, status, and output
//!   retrieval.
//! - [`WorkerPool`]: bounded concurrency for interactive and background
//!   runs.
//! - [`ExecutionHandle`]: the live local record with write-through
//!   mutation.
//! - [`StatusJanitor`]: periodic removal of finished records.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod handle;
pub mod janitor;
pub mod listener;
pub mod pool;

pub use config::EngineConfig;
pub use coordinator::{Coordinator, StatusView, NOTIFY_INPUT_KEY};
pub use error::EngineError;
pub use handle::ExecutionHandle;
pub use janitor::StatusJanitor;
pub use listener::StatusListener;
pub use pool::{TaskHandle, WaitError, WorkerPool};
