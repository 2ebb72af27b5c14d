//! External-process supervision.
//!
//! # Structure
//!
//! - [`ProcessSupervisor`] - generic key→process engine (idempotent start,
//!   graceful-then-forced stop, lifecycle event broadcasting)
//! - [`ProcessEvent`] / [`ExitOutcome`] - structured lifecycle events
//! - [`shutdown_child`] - SIGTERM → SIGKILL escalation for one child
//!
//! The supervisor owns the only mapping from supervision keys to live
//! process handles; at most one handle exists per key at any instant.

mod events;
mod shutdown;
mod supervisor;
mod types;

pub use events::{ExitOutcome, ExitReason, ProcessEvent};
pub use shutdown::shutdown_child;
pub use supervisor::{ProcessSupervisor, SupervisorError};
pub use types::{ActiveProcess, ProcessInfo};
