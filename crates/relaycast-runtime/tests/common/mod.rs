//! Shared helpers for process-spawning integration tests.
//!
//! The encoder binary is replaced by small `/bin/sh` scripts so the
//! supervision behavior can be exercised without a real encoder installed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use relaycast_core::{
    Destination, DestinationRepository, PatternSettings, PatternSettingsRepository,
    RepositoryError, StreamAuditLog, StreamId,
};
use relaycast_runtime::RuntimeConfig;

/// Write an executable stand-in encoder script into `dir`.
///
/// The script ignores whatever arguments the command builder rendered.
pub fn fake_encoder(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut permissions = fs::metadata(&path).expect("stat script").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("chmod script");
    path
}

/// A script that records each launch in `run_log` and then blocks.
pub fn recording_encoder(dir: &TempDir, run_log: &Path) -> PathBuf {
    fake_encoder(
        dir,
        "encoder-running",
        &format!("echo run >> {}\nexec sleep 30", run_log.display()),
    )
}

/// A script that records each launch and fails immediately.
pub fn failing_encoder(dir: &TempDir, run_log: &Path) -> PathBuf {
    fake_encoder(
        dir,
        "encoder-failing",
        &format!(
            "echo run >> {}\necho 'Connection refused' >&2\nexit 1",
            run_log.display()
        ),
    )
}

/// Number of launches recorded in a run log.
pub fn run_count(run_log: &Path) -> usize {
    fs::read_to_string(run_log).map_or(0, |contents| contents.lines().count())
}

/// Test configuration with short timeouts and fast retries.
pub fn test_config(ffmpeg_path: PathBuf) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.ffmpeg_path = ffmpeg_path;
    config.grace_timeout_secs = 1;
    config.probe_timeout_secs = 1;
    config.retry.base_delay_ms = 25;
    config.retry.max_delay_ms = 200;
    config
}

/// In-memory pattern settings store.
#[derive(Default)]
pub struct MemorySettings {
    entries: Mutex<HashMap<StreamId, PatternSettings>>,
}

impl MemorySettings {
    pub fn stored(&self, stream: &StreamId) -> Option<PatternSettings> {
        self.entries.lock().unwrap().get(stream).cloned()
    }
}

#[async_trait]
impl PatternSettingsRepository for MemorySettings {
    async fn load(&self, stream: &StreamId) -> Result<Option<PatternSettings>, RepositoryError> {
        Ok(self.entries.lock().unwrap().get(stream).cloned())
    }

    async fn save(
        &self,
        stream: &StreamId,
        settings: &PatternSettings,
    ) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .unwrap()
            .insert(stream.clone(), settings.clone());
        Ok(())
    }
}

/// Destination store backed by a fixed list.
pub struct StaticDestinations {
    destinations: Vec<Destination>,
}

impl StaticDestinations {
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self { destinations }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl DestinationRepository for StaticDestinations {
    async fn list_active(&self, stream: &StreamId) -> Result<Vec<Destination>, RepositoryError> {
        Ok(self
            .destinations
            .iter()
            .filter(|destination| &destination.stream == stream && destination.active)
            .cloned()
            .collect())
    }
}

/// Audit log that counts permanent-failure records.
#[derive(Default)]
pub struct CountingAudit {
    count: AtomicUsize,
    records: Mutex<Vec<(StreamId, i64, String)>>,
}

impl CountingAudit {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<(StreamId, i64, String)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamAuditLog for CountingAudit {
    async fn record_permanent_failure(
        &self,
        stream: &StreamId,
        destination_id: i64,
        reason: &str,
    ) -> Result<(), RepositoryError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .push((stream.clone(), destination_id, reason.to_string()));
        Ok(())
    }
}

/// A destination owned by `stream`.
pub fn destination(stream: &StreamId, id: i64) -> Destination {
    Destination {
        id,
        stream: stream.clone(),
        url: format!("rtmp://remote.example/app{id}"),
        stream_key: format!("key-{id}"),
        active: true,
    }
}
