//! Notification infrastructure for the tellus execution engine.
//!
//! - [`NotificationSender`]: the delivery contract invoked when an
//!   execution reaches a terminal phase.
//! - [`EmailNotifier`]: SMTP implementation over `lettre`.

pub mod email;
pub mod notify;

pub use email::{EmailConfig, EmailNotifier};
pub use notify::{ExecutionOutcome, NotificationSender, NotifyError};
