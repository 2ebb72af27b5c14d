//! Integration tests for the test-signal coordinator.
//!
//! Stand-in `/bin/sh` scripts replace the encoder binary; see
//! `common/mod.rs`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::{Instant, sleep};

use common::{MemorySettings, failing_encoder, recording_encoder, run_count, test_config};
use relaycast_core::{PatternKind, PatternSettingsUpdate, StreamId};
use relaycast_runtime::PatternManager;

/// The stand-in script appends to the run log after spawn, so counts are
/// observed with a polling wait.
async fn wait_for_runs(run_log: &std::path::Path, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while run_count(run_log) < expected {
        assert!(Instant::now() < deadline, "expected {expected} runs");
        sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn repeated_start_runs_exactly_one_process() {
    let dir = TempDir::new().unwrap();
    let run_log = dir.path().join("runs.log");
    let config = test_config(recording_encoder(&dir, &run_log));
    let settings = Arc::new(MemorySettings::default());
    let manager = PatternManager::new(config, settings);

    let stream = StreamId::new("abc");
    manager.start_pattern(&stream).await.unwrap();
    manager.start_pattern(&stream).await.unwrap();

    assert!(manager.is_running(&stream).await);
    assert_eq!(manager.list_active().await.len(), 1);
    wait_for_runs(&run_log, 1).await;
    // Give a second process (if any) time to show up in the log
    sleep(Duration::from_millis(200)).await;
    assert_eq!(run_count(&run_log), 1, "second start must be a no-op");

    manager.shutdown().await;
}

#[tokio::test]
async fn stop_on_idle_subject_is_a_safe_noop() {
    let dir = TempDir::new().unwrap();
    let run_log = dir.path().join("runs.log");
    let config = test_config(recording_encoder(&dir, &run_log));
    let manager = PatternManager::new(config, Arc::new(MemorySettings::default()));

    let stream = StreamId::new("xyz");
    manager.stop_pattern(&stream).await;
    assert!(!manager.is_running(&stream).await);
}

#[tokio::test]
async fn stop_terminates_the_process() {
    let dir = TempDir::new().unwrap();
    let run_log = dir.path().join("runs.log");
    let config = test_config(recording_encoder(&dir, &run_log));
    let manager = PatternManager::new(config, Arc::new(MemorySettings::default()));

    let stream = StreamId::new("abc");
    manager.start_pattern(&stream).await.unwrap();
    manager.stop_pattern(&stream).await;

    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.is_running(&stream).await {
        assert!(Instant::now() < deadline, "pattern did not stop");
        sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn genuine_failure_is_captured_and_consumed_once() {
    let dir = TempDir::new().unwrap();
    let run_log = dir.path().join("runs.log");
    let config = test_config(failing_encoder(&dir, &run_log));
    let manager = PatternManager::new(config, Arc::new(MemorySettings::default()));

    let stream = StreamId::new("abc");
    manager.start_pattern(&stream).await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let record = loop {
        if let Some(record) = manager.take_error(&stream) {
            break record;
        }
        assert!(Instant::now() < deadline, "no error record captured");
        sleep(Duration::from_millis(25)).await;
    };

    assert_eq!(record.subject, stream);
    assert!(record.message.contains("Connection refused"));
    // Consumed exactly once
    assert!(manager.take_error(&stream).is_none());
}

#[tokio::test]
async fn explicit_stop_produces_no_error_record() {
    let dir = TempDir::new().unwrap();
    let run_log = dir.path().join("runs.log");
    let config = test_config(recording_encoder(&dir, &run_log));
    let manager = PatternManager::new(config, Arc::new(MemorySettings::default()));

    let stream = StreamId::new("abc");
    manager.start_pattern(&stream).await.unwrap();
    manager.stop_pattern(&stream).await;
    // Let the termination complete
    sleep(Duration::from_millis(300)).await;

    assert!(
        manager.take_error(&stream).is_none(),
        "expected termination must not surface as a failure"
    );
    manager.shutdown().await;
}

#[tokio::test]
async fn update_settings_while_running_restarts_exactly_once() {
    let dir = TempDir::new().unwrap();
    let run_log = dir.path().join("runs.log");
    let config = test_config(recording_encoder(&dir, &run_log));
    let settings = Arc::new(MemorySettings::default());
    let manager = PatternManager::new(config, settings.clone());

    let stream = StreamId::new("abc");
    manager.start_pattern(&stream).await.unwrap();
    wait_for_runs(&run_log, 1).await;

    let updated = manager
        .update_settings(
            &stream,
            PatternSettingsUpdate {
                kind: Some(PatternKind::Gradient),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.kind, PatternKind::Gradient);
    // One stop followed by one start; never two overlapping processes
    assert!(manager.is_running(&stream).await);
    assert_eq!(manager.list_active().await.len(), 1);
    wait_for_runs(&run_log, 2).await;
    // The merged settings were persisted
    assert_eq!(
        settings.stored(&stream).map(|s| s.kind),
        Some(PatternKind::Gradient)
    );

    manager.shutdown().await;
}

#[tokio::test]
async fn update_settings_while_idle_only_persists() {
    let dir = TempDir::new().unwrap();
    let run_log = dir.path().join("runs.log");
    let config = test_config(recording_encoder(&dir, &run_log));
    let settings = Arc::new(MemorySettings::default());
    let manager = PatternManager::new(config, settings.clone());

    let stream = StreamId::new("idle");
    manager
        .update_settings(
            &stream,
            PatternSettingsUpdate {
                bitrate_kbps: Some(4000),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!manager.is_running(&stream).await);
    assert_eq!(run_count(&run_log), 0);
    assert_eq!(
        settings.stored(&stream).map(|s| s.bitrate_kbps),
        Some(4000)
    );
}

#[tokio::test]
async fn disabled_feature_makes_start_a_noop() {
    let dir = TempDir::new().unwrap();
    let run_log = dir.path().join("runs.log");
    let mut config = test_config(recording_encoder(&dir, &run_log));
    config.pattern.enabled = false;
    let manager = PatternManager::new(config, Arc::new(MemorySettings::default()));

    let stream = StreamId::new("abc");
    manager.start_pattern(&stream).await.unwrap();
    assert!(!manager.is_running(&stream).await);
    assert_eq!(run_count(&run_log), 0);
}
