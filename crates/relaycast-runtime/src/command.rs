//! Typed encoder command specification.
//!
//! A declarative description of an encoder invocation (inputs, filters,
//! outputs, codecs) that is validated and rendered into an argv before
//! anything is spawned. Building argument lists from structured specs
//! instead of concatenated strings removes injection risk and lets the
//! managers be unit-tested without spawning real processes.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from spec validation.
///
/// These are the only caller-visible errors in the supervision layer:
/// a spec that fails validation never reaches a spawn.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A spec must read from at least one input.
    #[error("Encoder spec has no inputs")]
    NoInputs,

    /// A spec must write to at least one output.
    #[error("Encoder spec has no outputs")]
    NoOutputs,

    /// URLs must be non-empty and free of whitespace and control characters.
    #[error("Invalid URL in encoder spec: {0:?}")]
    InvalidUrl(String),

    /// Filter names must be non-empty.
    #[error("Invalid filter in encoder spec: {0:?}")]
    InvalidFilter(String),

    /// Dimensions and rates must be non-zero.
    #[error("Invalid numeric parameter in encoder spec: {0}")]
    InvalidParameter(String),
}

/// Video codec selection for an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// Pass the input video through untouched (no re-encoding).
    Copy,
    /// Encode with libx264 tuned for low-latency streaming.
    H264,
}

/// Audio codec selection for an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// Pass the input audio through untouched.
    Copy,
    /// Encode with AAC at a streaming-friendly bitrate.
    Aac,
}

/// One input of an encoder invocation.
#[derive(Debug, Clone)]
pub struct InputSpec {
    /// Source URL, device string or lavfi graph description.
    pub url: String,
    /// Demuxer format (`lavfi` for synthetic sources, `flv` for RTMP feeds).
    pub format: Option<String>,
    /// Read at native frame rate instead of as fast as possible.
    pub realtime: bool,
}

impl InputSpec {
    /// Input read from a URL with no forced format.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: None,
            realtime: false,
        }
    }

    /// Synthetic input generated by a lavfi graph.
    pub fn lavfi(graph: impl Into<String>) -> Self {
        Self {
            url: graph.into(),
            format: Some("lavfi".to_string()),
            realtime: false,
        }
    }

    /// Force the input demuxer format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Read the input at its native rate.
    #[must_use]
    pub const fn realtime(mut self) -> Self {
        self.realtime = true;
        self
    }
}

/// One video filter in the processing chain.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    /// Filter name, e.g. `drawtext`.
    pub name: String,
    /// Filter parameters; values are escaped when rendered.
    pub params: Vec<(String, String)>,
}

impl FilterSpec {
    /// A filter with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    fn render(&self) -> String {
        if self.params.is_empty() {
            return self.name.clone();
        }
        let params = self
            .params
            .iter()
            .map(|(key, value)| format!("{key}={}", escape_filter_value(value)))
            .collect::<Vec<_>>()
            .join(":");
        format!("{}={params}", self.name)
    }
}

/// Escape a value for use inside a filter parameter.
///
/// Backslash, colon, comma and single quote are meaningful to the filter
/// graph parser and must not leak through from user-provided text.
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | ':' | ',' | '\'' | '[' | ']' | ';' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// One output of an encoder invocation.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    /// Destination URL.
    pub url: String,
    /// Muxer format (`flv` for RTMP destinations).
    pub format: Option<String>,
    /// Video codec; `None` leaves the encoder's default.
    pub video_codec: Option<VideoCodec>,
    /// Audio codec; `None` leaves the encoder's default.
    pub audio_codec: Option<AudioCodec>,
    /// Target video bitrate in kbit/s.
    pub bitrate_kbps: Option<u32>,
    /// Output frame rate.
    pub frame_rate: Option<u32>,
    /// Output dimensions as (width, height).
    pub size: Option<(u32, u32)>,
    /// Stop writing after this many seconds (bounded probes).
    pub duration_secs: Option<u32>,
}

impl OutputSpec {
    /// Output written to a URL with everything else defaulted.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: None,
            video_codec: None,
            audio_codec: None,
            bitrate_kbps: None,
            frame_rate: None,
            size: None,
            duration_secs: None,
        }
    }

    /// RTMP output: FLV muxer over the given URL.
    pub fn rtmp(url: impl Into<String>) -> Self {
        Self::url(url).with_format("flv")
    }

    /// Force the muxer format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set both codecs to passthrough.
    #[must_use]
    pub const fn passthrough(mut self) -> Self {
        self.video_codec = Some(VideoCodec::Copy);
        self.audio_codec = Some(AudioCodec::Copy);
        self
    }

    /// Select the video codec.
    #[must_use]
    pub const fn with_video_codec(mut self, codec: VideoCodec) -> Self {
        self.video_codec = Some(codec);
        self
    }

    /// Select the audio codec.
    #[must_use]
    pub const fn with_audio_codec(mut self, codec: AudioCodec) -> Self {
        self.audio_codec = Some(codec);
        self
    }

    /// Set the target video bitrate.
    #[must_use]
    pub const fn with_bitrate_kbps(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    /// Set the output frame rate.
    #[must_use]
    pub const fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    /// Set the output dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    /// Bound the output duration in seconds.
    #[must_use]
    pub const fn with_duration_secs(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}

/// Declarative description of one encoder invocation.
#[derive(Debug, Clone, Default)]
pub struct EncoderSpec {
    /// Inputs in argv order.
    pub inputs: Vec<InputSpec>,
    /// Video filter chain applied before the outputs.
    pub filters: Vec<FilterSpec>,
    /// Outputs in argv order.
    pub outputs: Vec<OutputSpec>,
}

impl EncoderSpec {
    /// Start an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input.
    #[must_use]
    pub fn input(mut self, input: InputSpec) -> Self {
        self.inputs.push(input);
        self
    }

    /// Append a filter to the video chain.
    #[must_use]
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append an output.
    #[must_use]
    pub fn output(mut self, output: OutputSpec) -> Self {
        self.outputs.push(output);
        self
    }

    /// Check the spec for structural problems before rendering.
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.inputs.is_empty() {
            return Err(CommandError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(CommandError::NoOutputs);
        }
        for input in &self.inputs {
            validate_url(&input.url)?;
        }
        for filter in &self.filters {
            if filter.name.is_empty() || !filter.name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(CommandError::InvalidFilter(filter.name.clone()));
            }
        }
        for output in &self.outputs {
            validate_url(&output.url)?;
            if let Some((width, height)) = output.size
                && (width == 0 || height == 0)
            {
                return Err(CommandError::InvalidParameter(format!(
                    "size {width}x{height}"
                )));
            }
            if output.frame_rate == Some(0) {
                return Err(CommandError::InvalidParameter("frame rate 0".to_string()));
            }
            if output.bitrate_kbps == Some(0) {
                return Err(CommandError::InvalidParameter("bitrate 0".to_string()));
            }
        }
        Ok(())
    }

    /// Validate and render the spec into a runnable command line.
    pub fn to_command(&self, ffmpeg_path: &Path) -> Result<EncoderCommand, CommandError> {
        self.validate()?;

        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            "error".into(),
        ];

        for input in &self.inputs {
            if input.realtime {
                args.push("-re".into());
            }
            if let Some(format) = &input.format {
                args.push("-f".into());
                args.push(format.clone());
            }
            args.push("-i".into());
            args.push(input.url.clone());
        }

        if !self.filters.is_empty() {
            let chain = self
                .filters
                .iter()
                .map(FilterSpec::render)
                .collect::<Vec<_>>()
                .join(",");
            args.push("-vf".into());
            args.push(chain);
        }

        for output in &self.outputs {
            match output.video_codec {
                Some(VideoCodec::Copy) => {
                    args.push("-c:v".into());
                    args.push("copy".into());
                }
                Some(VideoCodec::H264) => {
                    args.push("-c:v".into());
                    args.push("libx264".into());
                    args.push("-preset".into());
                    args.push("veryfast".into());
                    args.push("-tune".into());
                    args.push("zerolatency".into());
                    args.push("-pix_fmt".into());
                    args.push("yuv420p".into());
                }
                None => {}
            }
            match output.audio_codec {
                Some(AudioCodec::Copy) => {
                    args.push("-c:a".into());
                    args.push("copy".into());
                }
                Some(AudioCodec::Aac) => {
                    args.push("-c:a".into());
                    args.push("aac".into());
                    args.push("-b:a".into());
                    args.push("128k".into());
                }
                None => {}
            }
            if let Some(kbps) = output.bitrate_kbps {
                args.push("-b:v".into());
                args.push(format!("{kbps}k"));
            }
            if let Some(fps) = output.frame_rate {
                args.push("-r".into());
                args.push(fps.to_string());
            }
            if let Some((width, height)) = output.size {
                args.push("-s".into());
                args.push(format!("{width}x{height}"));
            }
            if let Some(secs) = output.duration_secs {
                args.push("-t".into());
                args.push(secs.to_string());
            }
            if let Some(format) = &output.format {
                args.push("-f".into());
                args.push(format.clone());
            }
            args.push(output.url.clone());
        }

        Ok(EncoderCommand {
            program: ffmpeg_path.to_path_buf(),
            args,
        })
    }
}

fn validate_url(url: &str) -> Result<(), CommandError> {
    if url.is_empty() || url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CommandError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// A rendered encoder invocation: the binary and its argument list.
#[derive(Debug, Clone)]
pub struct EncoderCommand {
    /// Path to the encoder binary.
    pub program: PathBuf,
    /// Arguments in argv order.
    pub args: Vec<String>,
}

impl EncoderCommand {
    /// A command built directly from a program and raw arguments.
    ///
    /// The supervisor only needs a program and argv; tests use this to
    /// supervise stand-in processes without an encoder binary.
    pub fn raw(program: impl Into<PathBuf>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
        }
    }
}
