//! Captured failure records for the polling status surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stream::StreamId;

/// Last captured failure for a test-signal subject.
///
/// Records are consumed at most once: the status surface hands one out via
/// get-and-clear, so every failure is surfaced exactly once to a poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// The stream the failure belongs to.
    pub subject: StreamId,
    /// Human-readable failure description (encoder stderr when available).
    pub message: String,
    /// When the failure was observed.
    pub occurred_at: DateTime<Utc>,
}

impl ErrorRecord {
    /// Record a failure observed now.
    pub fn new(subject: StreamId, message: impl Into<String>) -> Self {
        Self {
            subject,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}
