//! Structured process lifecycle events.
//!
//! Exit classification is based on the recorded exit status and the
//! supervisor's own stopping flag, never on matching message text: an exit
//! caused by the supervisor's graceful or forced signal surfaces as
//! [`ExitOutcome::Terminated`] and is filtered out of the failure paths.

use serde::Serialize;
use std::process::ExitStatus;

/// Why a process exited, as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitReason {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number, when killed by a signal (unix only).
    pub signal: Option<i32>,
}

impl ExitReason {
    /// An exit status we could not observe (e.g. wait failed).
    pub const UNKNOWN: Self = Self {
        code: None,
        signal: None,
    };

    /// Build from an [`ExitStatus`].
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    /// True for a clean zero exit.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExitOutcome {
    /// The process ended on its own.
    Completed {
        /// Observed exit status.
        reason: ExitReason,
        /// Last stderr line the process wrote, when captured.
        stderr_tail: Option<String>,
    },
    /// The supervisor terminated the process (graceful or forced).
    Terminated {
        /// Observed exit status after the termination signal.
        reason: ExitReason,
    },
    /// The command never started (binary missing, bad arguments).
    LaunchFailed {
        /// The spawn error.
        message: String,
    },
}

impl ExitOutcome {
    /// True for genuine failures: launch errors and non-zero natural exits.
    /// Expected terminations are never failures.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        match self {
            Self::Completed { reason, .. } => !reason.is_success(),
            Self::Terminated { .. } => false,
            Self::LaunchFailed { .. } => true,
        }
    }

    /// Human-readable description, preferring the encoder's own stderr.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Completed {
                reason,
                stderr_tail: Some(tail),
            } => format!("encoder failed ({reason}): {tail}"),
            Self::Completed { reason, .. } => format!("encoder exited with {reason}"),
            Self::Terminated { reason } => format!("terminated by supervisor ({reason})"),
            Self::LaunchFailed { message } => format!("failed to launch encoder: {message}"),
        }
    }
}

/// Lifecycle event for one supervised process.
///
/// Broadcast to all subscribers; the managers run one listener task each
/// and drive retry or error-recording logic from these.
#[derive(Debug, Clone)]
pub enum ProcessEvent<K> {
    /// The process was spawned and registered.
    Started {
        /// Supervision key.
        key: K,
        /// OS process id.
        pid: u32,
    },
    /// The process exited and its handle was removed.
    Exited {
        /// Supervision key.
        key: K,
        /// How it ended.
        outcome: ExitOutcome,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_exit_is_success_not_failure() {
        let outcome = ExitOutcome::Completed {
            reason: ExitReason {
                code: Some(0),
                signal: None,
            },
            stderr_tail: None,
        };
        assert!(!outcome.is_failure());
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let outcome = ExitOutcome::Completed {
            reason: ExitReason {
                code: Some(1),
                signal: None,
            },
            stderr_tail: Some("Connection refused".to_string()),
        };
        assert!(outcome.is_failure());
        assert!(outcome.describe().contains("Connection refused"));
    }

    #[test]
    fn supervisor_termination_is_never_a_failure() {
        let outcome = ExitOutcome::Terminated {
            reason: ExitReason {
                code: None,
                signal: Some(15),
            },
        };
        assert!(!outcome.is_failure());
    }

    #[test]
    fn launch_failure_is_a_failure() {
        let outcome = ExitOutcome::LaunchFailed {
            message: "No such file or directory".to_string(),
        };
        assert!(outcome.is_failure());
    }
}
