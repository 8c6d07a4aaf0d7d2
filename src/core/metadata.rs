//! Decoded per-frame animation metadata and the decoder seam.

use serde::{Deserialize, Serialize};

/// Metadata embedded in an alpha video (compositing parameters).
///
/// The binary layout is owned by the decoder; the core only reads the flags
/// it needs and forwards the whole structure to the renderer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMetadata {
    /// Resource uses the alternate (HEVC) codec variant
    pub is_hevc: bool,
    pub has_audio: bool,
    pub fps: Option<f64>,
    /// Total frames per cycle
    pub frames: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Renderer-specific description (per-frame effects, layout)
    pub descript: serde_json::Value,
}

impl VideoMetadata {
    /// Frame count for one cycle, derived from fps when not stated
    pub fn frames_per_cycle(&self, duration_secs: Option<f64>) -> Option<u32> {
        if let Some(frames) = self.frames.filter(|f| *f > 0) {
            return Some(frames);
        }
        match (self.fps, duration_secs) {
            (Some(fps), Some(d)) if fps > 0.0 && d > 0.0 => Some((fps * d).round() as u32),
            _ => None,
        }
    }
}

/// Extracts embedded metadata from a text-encoded (data URL) resource.
///
/// Must not fail: unparseable input yields `None`.
pub trait MetadataDecoder: Send + Sync {
    fn decode(&self, data_url: &str) -> Option<VideoMetadata>;
}

/// Decoder for resources without embedded metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDecoder;

impl MetadataDecoder for NullDecoder {
    fn decode(&self, _data_url: &str) -> Option<VideoMetadata> {
        None
    }
}
