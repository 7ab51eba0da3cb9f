//! Core entities and contracts for the tellus execution tracking engine.
//!
//! This crate carries no I/O. It defines:
//!
//! - [`Phase`]: the execution state machine.
//! - [`ExecutionStatus`]: the per-execution status record and its
//!   transition rules.
//! - [`Process`] / [`ExecutionListener`]: the contract between the
//!   engine and one invokable unit of work.
//! - [`ProcessRegistry`]: name-to-process resolution, built explicitly
//!   at startup.

pub mod error;
pub mod phase;
pub mod process;
pub mod registry;
pub mod status;
pub mod types;

pub use error::CoreError;
pub use phase::{Phase, PhaseId, TERMINAL_PHASES};
pub use process::{ExecutionListener, Process, ProcessError, ProcessName, ProcessOutput};
pub use registry::{ProcessRegistry, StaticProcessRegistry};
pub use status::ExecutionStatus;
pub use types::{new_execution_id, ClusterId, DbId, ExecutionId, ProcessData, Timestamp};
