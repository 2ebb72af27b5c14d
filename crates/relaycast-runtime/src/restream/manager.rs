//! Restream coordinator.
//!
//! Forwards a live stream to its configured destinations, one passthrough
//! encoder process per (stream, destination) pair. Transient failures are
//! retried with exponential backoff up to a ceiling; a pair that keeps
//! failing is abandoned and written to the audit log, after which only an
//! explicit manual restart recovers it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relaycast_core::{
    Destination, DestinationRepository, RestreamKey, Stores, StreamAuditLog, StreamId,
};

use super::backoff::BackoffPolicy;
use super::probe::{ProbeReport, probe_spec, run_probe};
use crate::command::{EncoderSpec, InputSpec, OutputSpec};
use crate::config::RuntimeConfig;
use crate::process::{ActiveProcess, ExitOutcome, ProcessEvent, ProcessSupervisor};

struct RetryState {
    /// Consecutive failures so far; never exceeds the configured ceiling.
    attempts: u32,
    /// Token for a scheduled relaunch, cancelled on explicit stop.
    pending: Option<CancellationToken>,
}

struct RestreamInner {
    supervisor: ProcessSupervisor<RestreamKey>,
    destinations: Arc<dyn DestinationRepository>,
    audit: Arc<dyn StreamAuditLog>,
    config: RuntimeConfig,
    backoff: BackoffPolicy,
    retries: StdMutex<HashMap<RestreamKey, RetryState>>,
    /// Destination snapshots for relaunching; kept while forwarding is
    /// wanted, removed on stop, clean end or abandonment.
    targets: StdMutex<HashMap<RestreamKey, Destination>>,
    shutdown: CancellationToken,
}

/// Coordinator for forwarding live streams to external destinations.
#[derive(Clone)]
pub struct RestreamManager {
    inner: Arc<RestreamInner>,
}

impl RestreamManager {
    /// Create the coordinator and start its event listener.
    #[must_use]
    pub fn new(
        config: RuntimeConfig,
        destinations: Arc<dyn DestinationRepository>,
        audit: Arc<dyn StreamAuditLog>,
    ) -> Self {
        let supervisor = ProcessSupervisor::new(config.grace_timeout());
        let backoff = BackoffPolicy::from(&config.retry);
        let inner = Arc::new(RestreamInner {
            supervisor,
            destinations,
            audit,
            config,
            backoff,
            retries: StdMutex::new(HashMap::new()),
            targets: StdMutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        });
        let events = inner.supervisor.subscribe();
        tokio::spawn(run_event_loop(Arc::clone(&inner), events));
        Self { inner }
    }

    /// Create the coordinator from a wired store container.
    #[must_use]
    pub fn from_stores(config: RuntimeConfig, stores: &Stores) -> Self {
        Self::new(
            config,
            Arc::clone(&stores.destinations),
            Arc::clone(&stores.audit),
        )
    }

    /// Start forwarding a stream to all its active destinations.
    ///
    /// A stream with no destinations is a no-op. Per-destination start
    /// failures are logged and do not abort the remaining destinations.
    pub async fn start_for_stream(&self, stream: &StreamId) -> Result<()> {
        let destinations = self
            .inner
            .destinations
            .list_active(stream)
            .await
            .with_context(|| format!("failed to list destinations for {stream}"))?;

        if destinations.is_empty() {
            debug!(stream = %stream, "no active destinations, nothing to forward");
            return Ok(());
        }

        for destination in destinations {
            if let Err(e) = self.start_destination(stream, &destination).await {
                warn!(
                    stream = %stream,
                    destination = destination.id,
                    error = %e,
                    "failed to start forwarding"
                );
            }
        }
        Ok(())
    }

    /// Start forwarding a stream to one destination.
    ///
    /// A manual start clears any retry state for the pair, which is the
    /// documented recovery path after the pair was abandoned.
    pub async fn start_destination(
        &self,
        stream: &StreamId,
        destination: &Destination,
    ) -> Result<()> {
        let key = RestreamKey::new(stream.clone(), destination.id);
        clear_retry(&self.inner, &key);
        if let Ok(mut targets) = self.inner.targets.lock() {
            targets.insert(key.clone(), destination.clone());
        }
        launch(&self.inner, key, destination).await
    }

    /// Stop every forwarding process for a stream and cancel its pending
    /// retries.
    pub async fn stop_for_stream(&self, stream: &StreamId) {
        let mut keys: HashSet<RestreamKey> = self
            .inner
            .supervisor
            .active_keys()
            .await
            .into_iter()
            .filter(|key| &key.stream == stream)
            .collect();
        if let Ok(retries) = self.inner.retries.lock() {
            keys.extend(retries.keys().filter(|key| &key.stream == stream).cloned());
        }
        if let Ok(targets) = self.inner.targets.lock() {
            keys.extend(targets.keys().filter(|key| &key.stream == stream).cloned());
        }

        for key in keys {
            clear_retry(&self.inner, &key);
            if let Ok(mut targets) = self.inner.targets.lock() {
                targets.remove(&key);
            }
            self.inner.supervisor.stop(&key).await;
        }
    }

    /// Probe a destination with a short synthetic stream.
    ///
    /// Runs outside the supervision map, is never retried and resolves
    /// within the configured probe deadline even when the destination
    /// produces no response at all.
    pub async fn test_destination(&self, destination: &Destination) -> Result<ProbeReport> {
        let command = probe_spec(&destination.publish_url())
            .to_command(&self.inner.config.ffmpeg_path)
            .context("invalid probe spec")?;
        Ok(run_probe(command, self.inner.config.probe_timeout()).await)
    }

    /// Whether a forwarding process is running for the pair.
    pub async fn is_running(&self, key: &RestreamKey) -> bool {
        self.inner.supervisor.is_running(key).await
    }

    /// Snapshot of running forwarding processes.
    pub async fn list_active(&self) -> Vec<ActiveProcess<RestreamKey>> {
        self.inner.supervisor.list_active().await
    }

    /// Current consecutive-failure count for a pair, if any.
    pub fn retry_attempts(&self, key: &RestreamKey) -> Option<u32> {
        self.inner
            .retries
            .lock()
            .ok()
            .and_then(|retries| retries.get(key).map(|state| state.attempts))
    }

    /// Stop everything, cancel pending retries and the event listener.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        if let Ok(mut retries) = self.inner.retries.lock() {
            for state in retries.values_mut() {
                if let Some(token) = state.pending.take() {
                    token.cancel();
                }
            }
            retries.clear();
        }
        if let Ok(mut targets) = self.inner.targets.lock() {
            targets.clear();
        }
        self.inner.supervisor.shutdown().await;
    }
}

/// Build and start the passthrough forwarding command for one pair.
async fn launch(
    inner: &Arc<RestreamInner>,
    key: RestreamKey,
    destination: &Destination,
) -> Result<()> {
    let spec = EncoderSpec::new()
        .input(InputSpec::url(inner.config.ingest_url(&key.stream)))
        .output(OutputSpec::rtmp(destination.publish_url()).passthrough());
    let command = spec
        .to_command(&inner.config.ffmpeg_path)
        .context("invalid forwarding spec")?;

    info!(
        stream = %key.stream,
        destination = key.destination_id,
        "starting forwarding process"
    );
    inner
        .supervisor
        .start(key.clone(), command)
        .await
        .with_context(|| format!("failed to start forwarding for {key}"))
}

fn clear_retry(inner: &Arc<RestreamInner>, key: &RestreamKey) {
    if let Ok(mut retries) = inner.retries.lock()
        && let Some(mut state) = retries.remove(key)
        && let Some(token) = state.pending.take()
    {
        token.cancel();
    }
}

/// Drives the retry policy from supervisor exit events.
async fn run_event_loop(
    inner: Arc<RestreamInner>,
    mut events: broadcast::Receiver<ProcessEvent<RestreamKey>>,
) {
    loop {
        let event = tokio::select! {
            () = inner.shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(ProcessEvent::Exited { key, outcome }) => {
                if outcome.is_failure() {
                    handle_failure(&inner, key, outcome.describe()).await;
                } else if matches!(outcome, ExitOutcome::Completed { .. }) {
                    // Source ended cleanly; forwarding for the pair is done.
                    debug!(key = %key, "forwarding ended cleanly");
                    clear_retry(&inner, &key);
                    if let Ok(mut targets) = inner.targets.lock() {
                        targets.remove(&key);
                    }
                }
            }
            Ok(ProcessEvent::Started { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "restream event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Apply the retry policy after a genuine failure.
///
/// The attempt counter defaults to 0 on first failure; while below the
/// ceiling it is incremented and a relaunch is scheduled after
/// `base × 2^attempt`. At the ceiling the pair is abandoned: retry state
/// dropped, one permanent-failure record appended.
async fn handle_failure(inner: &Arc<RestreamInner>, key: RestreamKey, message: String) {
    let still_wanted = inner
        .targets
        .lock()
        .is_ok_and(|targets| targets.contains_key(&key));
    if !still_wanted {
        // Stopped or abandoned while the exit event was in flight.
        return;
    }

    let attempts = inner
        .retries
        .lock()
        .ok()
        .and_then(|retries| retries.get(&key).map(|state| state.attempts))
        .unwrap_or(0);

    if attempts < inner.config.retry.max_attempts {
        let delay = inner.backoff.next(attempts);
        let token = inner.shutdown.child_token();
        if let Ok(mut retries) = inner.retries.lock() {
            retries.insert(
                key.clone(),
                RetryState {
                    attempts: attempts + 1,
                    pending: Some(token.clone()),
                },
            );
        }
        warn!(
            key = %key,
            attempt = attempts + 1,
            delay_ms = delay.as_millis() as u64,
            %message,
            "forwarding failed, retry scheduled"
        );
        tokio::spawn(relaunch_after(Arc::clone(inner), key, delay, token));
    } else {
        if let Ok(mut retries) = inner.retries.lock() {
            retries.remove(&key);
        }
        if let Ok(mut targets) = inner.targets.lock() {
            targets.remove(&key);
        }
        warn!(key = %key, %message, "retries exhausted, abandoning destination");
        if let Err(e) = inner
            .audit
            .record_permanent_failure(&key.stream, key.destination_id, &message)
            .await
        {
            warn!(key = %key, error = %e, "failed to write audit record");
        }
    }
}

async fn relaunch_after(
    inner: Arc<RestreamInner>,
    key: RestreamKey,
    delay: Duration,
    token: CancellationToken,
) {
    tokio::select! {
        () = token.cancelled() => return,
        () = sleep(delay) => {}
    }

    if let Ok(mut retries) = inner.retries.lock()
        && let Some(state) = retries.get_mut(&key)
    {
        state.pending = None;
    }

    let target = inner
        .targets
        .lock()
        .ok()
        .and_then(|targets| targets.get(&key).cloned());
    let Some(destination) = target else {
        // Explicitly stopped while the retry was pending.
        return;
    };

    if let Err(e) = launch(&inner, key.clone(), &destination).await {
        warn!(key = %key, error = %e, "scheduled relaunch failed to start");
    }
}
