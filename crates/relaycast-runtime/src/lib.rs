//! Encoder process supervision for relaycast.
//!
//! This crate owns the lifecycle of externally-spawned encoder subprocesses:
//!
//! - [`ProcessSupervisor`] — generic key→process engine with idempotent
//!   start, graceful-then-forced stop and lifecycle event broadcasting
//! - [`PatternManager`] — runs at most one synthetic test-signal source per
//!   stream when no publisher is live
//! - [`RestreamManager`] — forwards a live stream to external destinations,
//!   one process per (stream, destination) pair, with bounded retry
//! - [`EncoderSpec`] — typed, validated command description rendered into
//!   an encoder invocation
//!
//! The concrete encoder binary (an FFmpeg-compatible executable) is opaque
//! here; only its lifecycle is this crate's responsibility.

#![deny(unsafe_code)]

pub mod command;
pub mod config;
pub mod pattern;
pub mod process;
pub mod restream;

// Re-export the main supervision surface
pub use command::{
    AudioCodec, CommandError, EncoderCommand, EncoderSpec, FilterSpec, InputSpec, OutputSpec,
    VideoCodec,
};
pub use config::{PatternConfig, RetryConfig, RuntimeConfig};
pub use pattern::PatternManager;
pub use process::{
    ActiveProcess, ExitOutcome, ExitReason, ProcessEvent, ProcessInfo, ProcessSupervisor,
    SupervisorError, shutdown_child,
};
pub use restream::{BackoffPolicy, ProbeReport, RestreamManager};

// Silence unused dev-dependency warnings in unit test builds
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tracing_subscriber as _;
