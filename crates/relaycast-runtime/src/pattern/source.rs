//! Synthetic-source spec construction.
//!
//! Maps [`PatternSettings`] onto a lavfi graph: a procedural video source
//! per pattern kind, a silent audio track, and optional text/time overlays.

use relaycast_core::{PatternKind, PatternSettings};

use crate::command::{AudioCodec, EncoderSpec, FilterSpec, InputSpec, OutputSpec, VideoCodec};

/// Build the encoder spec for a test-signal source pushing to `ingest_url`.
#[must_use]
pub fn pattern_spec(settings: &PatternSettings, ingest_url: &str) -> EncoderSpec {
    let size = format!("{}x{}", settings.width, settings.height);
    let rate = settings.frame_rate;

    let video_graph = match settings.kind {
        PatternKind::Bars => format!("smptehdbars=size={size}:rate={rate}"),
        PatternKind::TestCard => format!("testsrc2=size={size}:rate={rate}"),
        PatternKind::Gradient => format!("gradients=size={size}:rate={rate}:speed=0.05"),
        PatternKind::Solid => format!(
            "color=c={}:size={size}:rate={rate}",
            settings.background_color
        ),
    };

    let mut spec = EncoderSpec::new()
        .input(InputSpec::lavfi(video_graph).realtime())
        .input(InputSpec::lavfi(
            "anullsrc=channel_layout=stereo:sample_rate=44100",
        ));

    if let Some(text) = &settings.overlay_text {
        spec = spec.filter(
            FilterSpec::new("drawtext")
                .param("text", text)
                .param("fontcolor", &settings.text_color)
                .param("fontsize", "48")
                .param("x", "(w-text_w)/2")
                .param("y", "(h-text_h)/2"),
        );
    }

    if settings.show_timestamp {
        spec = spec.filter(
            FilterSpec::new("drawtext")
                // The colon is escaped during rendering, which is exactly
                // what the %{...} expansion syntax requires.
                .param("text", "%{localtime:%F %T}")
                .param("fontcolor", &settings.text_color)
                .param("fontsize", "32")
                .param("x", "(w-text_w)/2")
                .param("y", "(h+text_h)/2+24"),
        );
    }

    spec.output(
        OutputSpec::rtmp(ingest_url)
            .with_video_codec(VideoCodec::H264)
            .with_audio_codec(AudioCodec::Aac)
            .with_bitrate_kbps(settings.bitrate_kbps)
            .with_frame_rate(settings.frame_rate),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_core::PatternSettingsUpdate;
    use std::path::Path;

    #[test]
    fn default_settings_render_bars_with_silent_audio() {
        let settings = PatternSettings::with_defaults();
        let command = pattern_spec(&settings, "rtmp://127.0.0.1:1935/live/abc")
            .to_command(Path::new("ffmpeg"))
            .expect("valid spec");
        let args = command.args.join(" ");
        assert!(args.contains("smptehdbars=size=1280x720:rate=30"));
        assert!(args.contains("anullsrc"));
        assert!(args.contains("-c:v libx264"));
        assert!(args.contains("-c:a aac"));
        assert!(args.contains("-f flv rtmp://127.0.0.1:1935/live/abc"));
    }

    #[test]
    fn gradient_kind_switches_the_source_graph() {
        let mut settings = PatternSettings::with_defaults();
        settings.merge(PatternSettingsUpdate {
            kind: Some(PatternKind::Gradient),
            ..Default::default()
        });
        let spec = pattern_spec(&settings, "rtmp://host/live/abc");
        assert!(spec.inputs[0].url.starts_with("gradients="));
    }

    #[test]
    fn overlay_text_adds_an_escaped_drawtext_filter() {
        let mut settings = PatternSettings::with_defaults();
        settings.overlay_text = Some("offline: back soon".to_string());
        let command = pattern_spec(&settings, "rtmp://host/live/abc")
            .to_command(Path::new("ffmpeg"))
            .unwrap();
        let args = command.args.join(" ");
        assert!(args.contains("drawtext=text=offline\\: back soon"));
    }

    #[test]
    fn timestamp_overlay_uses_localtime_expansion() {
        let mut settings = PatternSettings::with_defaults();
        settings.show_timestamp = true;
        let command = pattern_spec(&settings, "rtmp://host/live/abc")
            .to_command(Path::new("ffmpeg"))
            .unwrap();
        let args = command.args.join(" ");
        assert!(args.contains("%{localtime\\:%F %T}"));
    }
}
