//! Destination connectivity probe.
//!
//! Pushes a short, bounded-duration synthetic stream at a destination and
//! reports success or failure. Probes run outside the supervision map and
//! are never retried; a probe that produces no terminal event within the
//! deadline is force-killed and reported as a timeout.

use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::command::{AudioCodec, EncoderCommand, EncoderSpec, InputSpec, OutputSpec, VideoCodec};
use crate::process::ExitReason;

/// Video duration of the synthetic probe stream in seconds.
const PROBE_DURATION_SECS: u32 = 4;

/// Outcome of a destination probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Whether the destination accepted the test stream.
    pub success: bool,
    /// Human-readable outcome description.
    pub detail: String,
}

impl ProbeReport {
    fn success() -> Self {
        Self {
            success: true,
            detail: "destination accepted the test stream".to_string(),
        }
    }

    fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

/// Build the short synthetic stream spec for probing `publish_url`.
pub(super) fn probe_spec(publish_url: &str) -> EncoderSpec {
    EncoderSpec::new()
        .input(InputSpec::lavfi("testsrc2=size=320x180:rate=15").realtime())
        .input(InputSpec::lavfi(
            "anullsrc=channel_layout=stereo:sample_rate=44100",
        ))
        .output(
            OutputSpec::rtmp(publish_url)
                .with_video_codec(VideoCodec::H264)
                .with_audio_codec(AudioCodec::Aac)
                .with_bitrate_kbps(500)
                .with_duration_secs(PROBE_DURATION_SECS),
        )
}

/// Run a probe command to completion or the deadline, whichever is first.
pub(super) async fn run_probe(command: EncoderCommand, deadline: Duration) -> ProbeReport {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ProbeReport::failure(format!("failed to launch encoder: {e}")),
    };

    // Drain stderr so the child can't block on a full pipe; keep the last
    // line as the failure detail.
    let stderr_tail = match child.stderr.take() {
        Some(stderr) => tokio::spawn(async move {
            let mut tail = None;
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    tail = Some(line);
                }
            }
            tail
        }),
        None => tokio::spawn(async { None }),
    };

    match timeout(deadline, child.wait()).await {
        Ok(Ok(status)) if status.success() => {
            debug!("destination probe completed cleanly");
            ProbeReport::success()
        }
        Ok(Ok(status)) => {
            let reason = ExitReason::from_status(status);
            let tail = stderr_tail.await.ok().flatten();
            ProbeReport::failure(match tail {
                Some(tail) => format!("probe failed ({reason}): {tail}"),
                None => format!("probe failed ({reason})"),
            })
        }
        Ok(Err(e)) => ProbeReport::failure(format!("failed to observe probe exit: {e}")),
        Err(_) => {
            // No terminal event within the deadline: force-kill and reap so
            // no process lingers.
            let _ = child.kill().await;
            ProbeReport::failure(format!(
                "probe timed out after {} seconds",
                deadline.as_secs()
            ))
        }
    }
}
