//! Synthetic test-signal generation.
//!
//! Runs at most one procedurally-generated source process per stream when
//! no publisher is live.

mod manager;
mod source;

pub use manager::PatternManager;
pub use source::pattern_spec;
