//! Test-pattern generator settings.
//!
//! Per-stream configuration for the synthetic source that runs when no
//! publisher is live. Persisted by the settings store; defaults apply when
//! nothing is stored.

use serde::{Deserialize, Serialize};

/// Default output width in pixels.
pub const DEFAULT_WIDTH: u32 = 1280;
/// Default output height in pixels.
pub const DEFAULT_HEIGHT: u32 = 720;
/// Default frame rate.
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// Default video bitrate in kbit/s.
pub const DEFAULT_BITRATE_KBPS: u32 = 2500;

/// Which synthetic picture the generator produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// SMPTE color bars.
    #[default]
    Bars,
    /// Procedural test card with moving elements.
    TestCard,
    /// Animated color gradients.
    Gradient,
    /// A single solid color (uses `background_color`).
    Solid,
}

/// Per-stream generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    /// Picture to generate.
    pub kind: PatternKind,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub frame_rate: u32,
    /// Video bitrate in kbit/s.
    pub bitrate_kbps: u32,
    /// Optional text drawn over the picture.
    pub overlay_text: Option<String>,
    /// Draw a wall-clock timestamp under the overlay text.
    pub show_timestamp: bool,
    /// Overlay text color (ffmpeg color name or `0xRRGGBB`).
    pub text_color: String,
    /// Background color for [`PatternKind::Solid`].
    pub background_color: String,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PatternSettings {
    /// Settings used when the store has nothing for a stream.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            kind: PatternKind::Bars,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_rate: DEFAULT_FRAME_RATE,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            overlay_text: None,
            show_timestamp: false,
            text_color: "white".to_string(),
            background_color: "black".to_string(),
        }
    }

    /// Apply a partial update, leaving unset fields untouched.
    pub fn merge(&mut self, update: PatternSettingsUpdate) {
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(width) = update.width {
            self.width = width;
        }
        if let Some(height) = update.height {
            self.height = height;
        }
        if let Some(frame_rate) = update.frame_rate {
            self.frame_rate = frame_rate;
        }
        if let Some(bitrate) = update.bitrate_kbps {
            self.bitrate_kbps = bitrate;
        }
        if let Some(text) = update.overlay_text {
            // An explicit empty string clears the overlay.
            self.overlay_text = if text.is_empty() { None } else { Some(text) };
        }
        if let Some(show) = update.show_timestamp {
            self.show_timestamp = show;
        }
        if let Some(color) = update.text_color {
            self.text_color = color;
        }
        if let Some(color) = update.background_color {
            self.background_color = color;
        }
    }
}

/// Partial update for [`PatternSettings`].
///
/// All fields optional so callers can patch a single knob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettingsUpdate {
    pub kind: Option<PatternKind>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub bitrate_kbps: Option<u32>,
    pub overlay_text: Option<String>,
    pub show_timestamp: Option<bool>,
    pub text_color: Option<String>,
    pub background_color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = PatternSettings::with_defaults();
        assert_eq!(settings.kind, PatternKind::Bars);
        assert_eq!(settings.width, 1280);
        assert_eq!(settings.height, 720);
        assert_eq!(settings.frame_rate, 30);
        assert!(settings.overlay_text.is_none());
    }

    #[test]
    fn merge_only_touches_set_fields() {
        let mut settings = PatternSettings::with_defaults();
        settings.merge(PatternSettingsUpdate {
            kind: Some(PatternKind::Gradient),
            bitrate_kbps: Some(4000),
            ..Default::default()
        });
        assert_eq!(settings.kind, PatternKind::Gradient);
        assert_eq!(settings.bitrate_kbps, 4000);
        // Untouched fields keep their defaults
        assert_eq!(settings.width, DEFAULT_WIDTH);
        assert_eq!(settings.frame_rate, DEFAULT_FRAME_RATE);
    }

    #[test]
    fn merge_empty_text_clears_overlay() {
        let mut settings = PatternSettings::with_defaults();
        settings.merge(PatternSettingsUpdate {
            overlay_text: Some("on air".to_string()),
            ..Default::default()
        });
        assert_eq!(settings.overlay_text.as_deref(), Some("on air"));

        settings.merge(PatternSettingsUpdate {
            overlay_text: Some(String::new()),
            ..Default::default()
        });
        assert!(settings.overlay_text.is_none());
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let settings: PatternSettings = serde_json::from_str("{\"kind\":\"testcard\"}").unwrap();
        assert_eq!(settings.kind, PatternKind::TestCard);
        assert_eq!(settings.height, DEFAULT_HEIGHT);
    }
}
