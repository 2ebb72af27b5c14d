//! Runtime configuration for the supervision engine.
//!
//! All fields have serde defaults so a partial config file deserializes to
//! something usable. Durations are stored as integer seconds/milliseconds
//! and exposed through accessor methods.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_TIMEOUT_SECS: u64 = 5;
/// Default deadline for a destination connectivity probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;
/// Default retry ceiling for a failing destination.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default first retry delay in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 5_000;
/// Default retry delay cap in milliseconds.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 60_000;

/// Configuration for the supervision runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Path to the encoder binary.
    pub ffmpeg_path: PathBuf,
    /// Base RTMP URL of the local ingest; stream ids are appended as the
    /// path component (e.g. `rtmp://127.0.0.1:1935/live`).
    pub ingest_base_url: String,
    /// Seconds to wait after a graceful signal before forcing termination.
    pub grace_timeout_secs: u64,
    /// Seconds before a destination probe is abandoned.
    pub probe_timeout_secs: u64,
    /// Retry policy for failing restream destinations.
    pub retry: RetryConfig,
    /// Test-pattern generator settings.
    pub pattern: PatternConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ingest_base_url: "rtmp://127.0.0.1:1935/live".to_string(),
            grace_timeout_secs: DEFAULT_GRACE_TIMEOUT_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            retry: RetryConfig::default(),
            pattern: PatternConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Grace period between the graceful and forced termination signals.
    #[must_use]
    pub const fn grace_timeout(&self) -> Duration {
        Duration::from_secs(self.grace_timeout_secs)
    }

    /// Overall deadline for a destination connectivity probe.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Local ingest feed URL for a stream.
    #[must_use]
    pub fn ingest_url(&self, stream: &relaycast_core::StreamId) -> String {
        format!("{}/{}", self.ingest_base_url.trim_end_matches('/'), stream)
    }
}

/// Retry policy knobs for restream destinations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive failures tolerated before the pair is abandoned.
    pub max_attempts: u32,
    /// First retry delay in milliseconds; doubles each attempt.
    pub base_delay_ms: u64,
    /// Upper bound on the retry delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// First retry delay.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Retry delay cap.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Test-pattern generator feature switches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// When false, `start_pattern` is a logged no-op.
    pub enabled: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
