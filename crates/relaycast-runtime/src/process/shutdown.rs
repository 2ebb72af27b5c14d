//! Graceful shutdown for `tokio::process::Child` with SIGTERM → SIGKILL
//! escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use tokio::time::timeout;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Gracefully shut down a child process, escalating to SIGKILL if needed.
///
/// # Strategy
/// 1. Send SIGTERM and wait up to `grace` for a clean exit
/// 2. If still running, send SIGKILL
/// 3. Wait for process reaping (required to avoid zombies)
///
/// # Platform behavior
/// - Unix: SIGTERM via the nix crate, then SIGKILL via `Child::kill`
/// - Windows: immediately calls `Child::kill` (no graceful signal exists)
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        shutdown_unix(child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await?;
        child.wait().await
    }
}

#[cfg(unix)]
async fn shutdown_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped; collect the status.
        return child.wait().await;
    };

    // Phase 1: SIGTERM with a grace period
    #[allow(clippy::cast_possible_wrap)]
    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        // Process may have already exited
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    // Phase 2: SIGKILL (Child::kill sends SIGKILL on unix)
    child.kill().await?;

    // Phase 3: reap (fast after SIGKILL)
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;
    use tokio::time::{Instant, sleep};

    #[tokio::test]
    #[cfg(unix)]
    async fn responds_to_sigterm_within_grace() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");

        let status = shutdown_child(&mut child, Duration::from_secs(5))
            .await
            .expect("shutdown failed");
        // Killed by SIGTERM, not a normal exit
        assert!(!status.success());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn escalates_when_sigterm_is_ignored() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30")
            .spawn()
            .expect("failed to spawn sh");

        let start = Instant::now();
        let status = shutdown_child(&mut child, Duration::from_millis(200))
            .await
            .expect("shutdown failed");
        assert!(!status.success());
        // Past the grace period (SIGKILL path), but nowhere near 30s
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn handles_already_exited_child() {
        let mut child = Command::new("echo")
            .arg("test")
            .spawn()
            .expect("failed to spawn echo");

        // Give it time to exit
        sleep(Duration::from_millis(100)).await;

        let status = shutdown_child(&mut child, Duration::from_secs(1)).await;
        assert!(status.is_ok());
    }
}
