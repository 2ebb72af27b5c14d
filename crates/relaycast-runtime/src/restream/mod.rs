//! Live-stream forwarding to external destinations.
//!
//! One passthrough encoder process per (stream, destination) pair, with a
//! bounded exponential-backoff retry policy and a connectivity probe.

mod backoff;
mod manager;
mod probe;

pub use backoff::BackoffPolicy;
pub use manager::RestreamManager;
pub use probe::ProbeReport;
