//! Session configuration.

use crate::error::Result;
use crate::types::Rgb;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Background colour the surface starts with and resets to.
pub const DEFAULT_BACKGROUND: &str = "#bfbfbf";

/// Output size and frame pacing of a capture sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Forced output width in pixels.
    pub width: u32,
    /// Forced output height in pixels.
    pub height: u32,
    /// Frames presented before the first view is placed.
    pub settle_frames: u32,
    /// Frames presented after each camera move, before the readback.
    pub frames_per_view: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            settle_frames: 3,
            frames_per_view: 2,
        }
    }
}

/// Main session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Hex background colour, e.g. `#bfbfbf`.
    pub background_color: String,
    /// Retag colour maps as sRGB while normalizing.
    pub preserve_materials: bool,
    pub capture: CaptureSettings,
    /// Edge length of the key light's shadow map.
    pub shadow_map_size: u32,
    /// Surface size used when the drawable reports zero.
    pub fallback_width: u32,
    pub fallback_height: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            background_color: DEFAULT_BACKGROUND.to_string(),
            preserve_materials: true,
            capture: CaptureSettings::default(),
            shadow_map_size: 2048,
            fallback_width: 600,
            fallback_height: 400,
        }
    }
}

impl SnapshotConfig {
    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn with_background_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = color.into();
        self
    }

    pub fn with_preserve_materials(mut self, preserve: bool) -> Self {
        self.preserve_materials = preserve;
        self
    }

    pub fn with_capture_size(mut self, width: u32, height: u32) -> Self {
        self.capture.width = width;
        self.capture.height = height;
        self
    }

    pub fn with_capture(mut self, capture: CaptureSettings) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    /// The configured background, or the default when it does not parse.
    pub fn background(&self) -> Rgb {
        Rgb::from_hex(&self.background_color).unwrap_or_else(|| {
            tracing::warn!("Invalid background colour {:?}, using {}", self.background_color, DEFAULT_BACKGROUND);
            Rgb::from_u32(0xbfbfbf)
        })
    }
}
