//! Test-signal coordinator.
//!
//! One instance per running application, constructed at startup and passed
//! by reference to its consumers. Runs at most one synthetic-source process
//! per stream, captures genuine failures as one-shot error records, and
//! applies settings changes as a single stop/start cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relaycast_core::{
    ErrorRecord, PatternSettings, PatternSettingsRepository, PatternSettingsUpdate, Stores,
    StreamId,
};

use super::source::pattern_spec;
use crate::config::RuntimeConfig;
use crate::process::{ActiveProcess, ProcessEvent, ProcessSupervisor};

struct PatternInner {
    supervisor: ProcessSupervisor<StreamId>,
    settings: Arc<dyn PatternSettingsRepository>,
    config: RuntimeConfig,
    errors: StdMutex<HashMap<StreamId, ErrorRecord>>,
    shutdown: CancellationToken,
}

/// Coordinator for synthetic test-signal sources.
#[derive(Clone)]
pub struct PatternManager {
    inner: Arc<PatternInner>,
}

impl PatternManager {
    /// Create the coordinator and start its event listener.
    #[must_use]
    pub fn new(config: RuntimeConfig, settings: Arc<dyn PatternSettingsRepository>) -> Self {
        let supervisor = ProcessSupervisor::new(config.grace_timeout());
        let inner = Arc::new(PatternInner {
            supervisor,
            settings,
            config,
            errors: StdMutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        });
        let events = inner.supervisor.subscribe();
        tokio::spawn(run_event_loop(Arc::clone(&inner), events));
        Self { inner }
    }

    /// Create the coordinator from a wired store container.
    #[must_use]
    pub fn from_stores(config: RuntimeConfig, stores: &Stores) -> Self {
        Self::new(config, Arc::clone(&stores.settings))
    }

    /// Start the test signal for a stream.
    ///
    /// No-op when the feature is disabled or a source is already running
    /// for the subject. Settings are loaded from the store, with defaults
    /// when absent or on store failure.
    pub async fn start_pattern(&self, stream: &StreamId) -> Result<()> {
        if !self.inner.config.pattern.enabled {
            debug!(stream = %stream, "test pattern disabled by configuration");
            return Ok(());
        }
        if self.inner.supervisor.is_running(stream).await {
            debug!(stream = %stream, "test pattern already running");
            return Ok(());
        }

        let settings = self.load_settings(stream).await;
        self.launch(stream, &settings).await
    }

    /// Stop the test signal for a stream. Safe no-op when idle.
    pub async fn stop_pattern(&self, stream: &StreamId) {
        self.inner.supervisor.stop(stream).await;
    }

    /// Whether a test signal is running for the stream.
    pub async fn is_running(&self, stream: &StreamId) -> bool {
        self.inner.supervisor.is_running(stream).await
    }

    /// Snapshot of running test-signal processes.
    pub async fn list_active(&self) -> Vec<ActiveProcess<StreamId>> {
        self.inner.supervisor.list_active().await
    }

    /// Atomically take the stored error record for a subject, if any.
    ///
    /// Each failure is surfaced exactly once: a second call returns `None`
    /// until the next failure.
    pub fn take_error(&self, stream: &StreamId) -> Option<ErrorRecord> {
        self.inner
            .errors
            .lock()
            .ok()
            .and_then(|mut errors| errors.remove(stream))
    }

    /// Merge a partial update into the stored settings and apply it.
    ///
    /// Persistence is fire-and-forget: a store failure is logged and does
    /// not roll back the in-memory change. When a source is running for the
    /// subject it is restarted exactly once with the new configuration.
    pub async fn update_settings(
        &self,
        stream: &StreamId,
        update: PatternSettingsUpdate,
    ) -> Result<PatternSettings> {
        let mut settings = self.load_settings(stream).await;
        settings.merge(update);

        if let Err(e) = self.inner.settings.save(stream, &settings).await {
            warn!(stream = %stream, error = %e, "failed to persist pattern settings");
        }

        if self.inner.supervisor.is_running(stream).await {
            info!(stream = %stream, "restarting test pattern with new settings");
            self.inner.supervisor.stop_wait(stream).await;
            self.launch(stream, &settings).await?;
        }

        Ok(settings)
    }

    /// Stop everything and cancel the event listener.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.supervisor.shutdown().await;
    }

    async fn load_settings(&self, stream: &StreamId) -> PatternSettings {
        match self.inner.settings.load(stream).await {
            Ok(Some(settings)) => settings,
            Ok(None) => PatternSettings::with_defaults(),
            Err(e) => {
                warn!(stream = %stream, error = %e, "failed to load pattern settings, using defaults");
                PatternSettings::with_defaults()
            }
        }
    }

    async fn launch(&self, stream: &StreamId, settings: &PatternSettings) -> Result<()> {
        let ingest_url = self.inner.config.ingest_url(stream);
        let command = pattern_spec(settings, &ingest_url)
            .to_command(&self.inner.config.ffmpeg_path)
            .context("invalid test pattern spec")?;

        // A successful (re)start clears the previous failure for the subject.
        if let Ok(mut errors) = self.inner.errors.lock() {
            errors.remove(stream);
        }

        self.inner
            .supervisor
            .start(stream.clone(), command)
            .await
            .with_context(|| format!("failed to start test pattern for {stream}"))
    }
}

/// Records genuine runtime failures as one-shot error records.
///
/// Expected terminations and clean exits never produce a record.
async fn run_event_loop(
    inner: Arc<PatternInner>,
    mut events: broadcast::Receiver<ProcessEvent<StreamId>>,
) {
    loop {
        let event = tokio::select! {
            () = inner.shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(ProcessEvent::Exited { key, outcome }) if outcome.is_failure() => {
                let message = outcome.describe();
                warn!(stream = %key, %message, "test pattern failed");
                if let Ok(mut errors) = inner.errors.lock() {
                    errors.insert(key.clone(), ErrorRecord::new(key, message));
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "pattern event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
