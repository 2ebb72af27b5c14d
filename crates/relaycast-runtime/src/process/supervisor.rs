//! Generic external-process supervisor.
//!
//! Owns the only mapping from supervision keys to live process handles and
//! provides idempotent start/stop with a graceful-then-forced termination
//! protocol. Lifecycle events fan out on a broadcast channel; failures are
//! never thrown to `start`/`stop` callers (only malformed input is).

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::events::{ExitOutcome, ExitReason, ProcessEvent};
use super::shutdown::shutdown_child;
use super::types::{ActiveProcess, ProcessInfo};
use crate::command::{CommandError, EncoderCommand};

/// Broadcast channel capacity for lifecycle events.
const EVENT_CAPACITY: usize = 64;

/// Caller-visible supervisor errors.
///
/// Everything else (launch failures, runtime failures) surfaces as
/// [`ProcessEvent::Exited`] instead.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The command spec failed validation.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A stop is in flight for this key; the caller must wait for the exit
    /// event before restarting.
    #[error("Process for key {0} is stopping; wait for it to exit before restarting")]
    Stopping(String),
}

/// Keys a supervisor can be indexed by.
pub trait SupervisionKey: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {}
impl<K: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static> SupervisionKey for K {}

struct Handle {
    info: ProcessInfo,
    cancel: CancellationToken,
    /// Set when a stop is in flight; resolves the stop/start race by
    /// rejecting new starts until the exit event removes the handle.
    stopping: bool,
}

struct Inner<K> {
    processes: Mutex<HashMap<K, Handle>>,
    events: broadcast::Sender<ProcessEvent<K>>,
    grace: Duration,
}

/// Generic engine owning the key → live process mapping.
///
/// Constructed once at application start and injected into the managers;
/// there is no global instance.
pub struct ProcessSupervisor<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for ProcessSupervisor<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: SupervisionKey> ProcessSupervisor<K> {
    /// Create a supervisor with the given graceful-termination grace period.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                processes: Mutex::new(HashMap::new()),
                events,
                grace,
            }),
        }
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent<K>> {
        self.inner.events.subscribe()
    }

    /// Start a process for `key`.
    ///
    /// Idempotent: if a process is already running for the key this is a
    /// no-op. A key with a stop in flight is rejected with
    /// [`SupervisorError::Stopping`]. A spawn failure is reported through an
    /// [`ExitOutcome::LaunchFailed`] event, not as an error here.
    pub async fn start(&self, key: K, command: EncoderCommand) -> Result<(), SupervisorError> {
        let mut processes = self.inner.processes.lock().await;

        if let Some(handle) = processes.get(&key) {
            if handle.stopping {
                return Err(SupervisorError::Stopping(key.to_string()));
            }
            debug!(key = %key, "process already running, start is a no-op");
            return Ok(());
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(key = %key, program = %command.program.display(), error = %e, "failed to launch encoder");
                let _ = self.inner.events.send(ProcessEvent::Exited {
                    key,
                    outcome: ExitOutcome::LaunchFailed {
                        message: e.to_string(),
                    },
                });
                return Ok(());
            }
        };

        let pid = child.id().unwrap_or_default();
        let stderr_task = spawn_output_readers(&mut child, &key);

        let cancel = CancellationToken::new();
        processes.insert(
            key.clone(),
            Handle {
                info: ProcessInfo::new(pid),
                cancel: cancel.clone(),
                stopping: false,
            },
        );
        drop(processes);

        info!(key = %key, pid = %pid, "encoder process started");
        let _ = self.inner.events.send(ProcessEvent::Started {
            key: key.clone(),
            pid,
        });

        tokio::spawn(monitor(
            Arc::clone(&self.inner),
            key,
            child,
            cancel,
            stderr_task,
        ));

        Ok(())
    }

    /// Stop the process for `key`.
    ///
    /// No-op when nothing is running or a stop is already in flight.
    /// Termination is asynchronous: the handle stays registered (in the
    /// `Stopping` state) until the process has actually exited.
    pub async fn stop(&self, key: &K) {
        let mut processes = self.inner.processes.lock().await;
        let Some(handle) = processes.get_mut(key) else {
            debug!(key = %key, "stop requested for idle key, nothing to do");
            return;
        };
        if handle.stopping {
            debug!(key = %key, "stop already in flight");
            return;
        }
        handle.stopping = true;
        handle.cancel.cancel();
        info!(key = %key, pid = %handle.info.pid, "stopping encoder process");
    }

    /// Stop the process for `key` and wait until its handle is removed.
    ///
    /// Used where the caller needs an immediate restart without overlapping
    /// processes (e.g. applying new generator settings).
    pub async fn stop_wait(&self, key: &K) {
        let mut events = self.subscribe();

        {
            let mut processes = self.inner.processes.lock().await;
            let Some(handle) = processes.get_mut(key) else {
                return;
            };
            if !handle.stopping {
                handle.stopping = true;
                handle.cancel.cancel();
                info!(key = %key, pid = %handle.info.pid, "stopping encoder process");
            }
        }

        // Generous deadline: graceful grace period plus the forced-kill reap.
        let deadline = self.inner.grace + Duration::from_secs(2);
        let _ = timeout(deadline, async {
            loop {
                match events.recv().await {
                    Ok(ProcessEvent::Exited { key: exited, .. }) if &exited == key => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if !self.is_running(key).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
        .await;
    }

    /// O(1) membership check. A key in the `Stopping` state still counts as
    /// running until the process has exited.
    pub async fn is_running(&self, key: &K) -> bool {
        self.inner.processes.lock().await.contains_key(key)
    }

    /// Snapshot of all supervised processes.
    pub async fn list_active(&self) -> Vec<ActiveProcess<K>> {
        self.inner
            .processes
            .lock()
            .await
            .iter()
            .map(|(key, handle)| ActiveProcess {
                key: key.clone(),
                info: handle.info.clone(),
            })
            .collect()
    }

    /// Keys of all supervised processes.
    pub async fn active_keys(&self) -> Vec<K> {
        self.inner.processes.lock().await.keys().cloned().collect()
    }

    /// Stop everything and wait for all handles to be removed.
    pub async fn shutdown(&self) {
        let keys: Vec<K> = {
            let mut processes = self.inner.processes.lock().await;
            for handle in processes.values_mut() {
                handle.stopping = true;
                handle.cancel.cancel();
            }
            processes.keys().cloned().collect()
        };
        for key in keys {
            self.stop_wait(&key).await;
        }
    }
}

/// Wire stdout/stderr readers.
///
/// Output lines are diagnostic only, a stderr line is never an error
/// signal by itself. The returned task resolves to the last non-empty
/// stderr line once the pipe closes, so failure events can carry the
/// encoder's own message.
fn spawn_output_readers<K: SupervisionKey>(
    child: &mut Child,
    key: &K,
) -> JoinHandle<Option<String>> {
    if let Some(stdout) = child.stdout.take() {
        let key = key.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                trace!(key = %key, "encoder stdout: {line}");
            }
        });
    }

    let Some(stderr) = child.stderr.take() else {
        return tokio::spawn(async { None });
    };
    let key = key.to_string();
    tokio::spawn(async move {
        let mut tail = None;
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            trace!(key = %key, "encoder stderr: {line}");
            if !line.trim().is_empty() {
                tail = Some(line);
            }
        }
        tail
    })
}

/// Per-process monitor task.
///
/// Waits for natural exit or a stop request, performs the
/// graceful-then-forced shutdown when asked, removes the handle exactly
/// once and broadcasts the exit event. A natural exit during the grace
/// window implicitly cancels the forced kill.
async fn monitor<K: SupervisionKey>(
    inner: Arc<Inner<K>>,
    key: K,
    mut child: Child,
    cancel: CancellationToken,
    stderr_task: JoinHandle<Option<String>>,
) {
    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                let reason = ExitReason::from_status(status);
                debug!(key = %key, %reason, "encoder process exited");
                // The reader resolves once the pipe closes, which the exit
                // guarantees; the deadline only covers a wedged reader.
                let stderr_tail = timeout(Duration::from_secs(1), stderr_task)
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .flatten();
                ExitOutcome::Completed { reason, stderr_tail }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "failed to observe encoder exit");
                ExitOutcome::Completed {
                    reason: ExitReason::UNKNOWN,
                    stderr_tail: Some(format!("wait failed: {e}")),
                }
            }
        },
        () = cancel.cancelled() => {
            let reason = match shutdown_child(&mut child, inner.grace).await {
                Ok(status) => ExitReason::from_status(status),
                Err(e) => {
                    warn!(key = %key, error = %e, "graceful shutdown failed");
                    ExitReason::UNKNOWN
                }
            };
            ExitOutcome::Terminated { reason }
        }
    };

    let stopping = {
        let mut processes = inner.processes.lock().await;
        processes.remove(&key).is_some_and(|handle| handle.stopping)
    };

    // A stop request that raced with a natural exit is still an expected
    // termination; never let it reach the failure paths.
    let outcome = match outcome {
        ExitOutcome::Completed { reason, .. } if stopping => ExitOutcome::Terminated { reason },
        other => other,
    };

    let _ = inner.events.send(ProcessEvent::Exited { key, outcome });
}
