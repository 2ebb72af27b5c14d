//! Shared types for process supervision.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Information about one supervised process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    /// OS process id.
    pub pid: u32,
    /// When the process was spawned.
    pub started_at: DateTime<Utc>,
}

impl ProcessInfo {
    /// Info for a process spawned now.
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            started_at: Utc::now(),
        }
    }
}

/// Snapshot entry for the status query surface.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveProcess<K> {
    /// Supervision key the process runs under.
    pub key: K,
    /// Process details.
    pub info: ProcessInfo,
}
