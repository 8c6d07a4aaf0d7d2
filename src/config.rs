//! Playback configuration
//!
//! `PlaybackConfig` is supplied by the caller and stays immutable for the life
//! of one session. The serialisable part lives in `PlaybackOptions` so hosts
//! can keep presets in `alphaplay.json`.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::traits::MediaElement;
use crate::error::PlaybackError;

/// Configured repeat count
///
/// 0 and 1 both mean "play once"; N > 1 means N total cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopCount {
    #[default]
    Once,
    Times(u32),
    Infinite,
}

impl LoopCount {
    /// Map a raw count: negative = infinite, 0/1 = once
    pub fn from_count(n: i64) -> Self {
        match n {
            n if n < 0 => LoopCount::Infinite,
            0 | 1 => LoopCount::Once,
            n if n > u32::MAX as i64 => LoopCount::Infinite,
            n => LoopCount::Times(n as u32),
        }
    }

    /// Total cycles to play, None for infinite
    pub fn cycles(&self) -> Option<u32> {
        match self {
            LoopCount::Once => Some(1),
            LoopCount::Times(n) => Some((*n).max(1)),
            LoopCount::Infinite => None,
        }
    }

    /// True when the media element should repeat natively (effective count > 1)
    pub fn is_repeating(&self) -> bool {
        match self.cycles() {
            Some(n) => n > 1,
            None => true,
        }
    }
}

impl Serialize for LoopCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LoopCount::Once => serializer.serialize_u32(1),
            LoopCount::Times(n) => serializer.serialize_u32(*n),
            LoopCount::Infinite => serializer.serialize_bool(true),
        }
    }
}

impl<'de> Deserialize<'de> for LoopCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Count(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => LoopCount::Infinite,
            Raw::Flag(false) => LoopCount::Once,
            Raw::Count(n) => LoopCount::from_count(n),
        })
    }
}

/// Renderer variant requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// GPU compositing
    #[default]
    #[serde(alias = "webgl")]
    Gpu,
    /// Raster fallback
    #[serde(alias = "canvas2d")]
    Raster,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Gpu => write!(f, "gpu"),
            RenderMode::Raster => write!(f, "raster"),
        }
    }
}

/// Serialisable playback options (all fields optional in JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    /// Alternate codec variant, used when the platform supports it
    pub hevc_url: Option<String>,
    /// Caller-owned media element id (element is kept on teardown)
    pub video_id: Option<String>,
    #[serde(rename = "loop")]
    pub loop_count: LoopCount,
    /// Mute preference; None = unmuted when the resource has audio
    pub mute: Option<bool>,
    /// Persist raw bytes + metadata in the cache store
    pub use_byte_cache: bool,
    /// Let the renderer keep decoded frames
    pub use_frame_cache: bool,
    /// Fetch bytes up-front; false assigns the identifier directly
    pub use_prefetch: bool,
    /// Decode embedded per-frame metadata
    pub use_metadata: bool,
    pub render_mode: RenderMode,
    /// Arm the duration watchdog when not looping
    pub check_timeout: bool,
    /// Keep the media element visible
    pub show_video: bool,
    /// When false, platforms with broken object URLs stream the identifier directly
    pub force_object_url: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            hevc_url: None,
            video_id: None,
            loop_count: LoopCount::Once,
            mute: None,
            use_byte_cache: true,
            use_frame_cache: true,
            use_prefetch: true,
            use_metadata: true,
            render_mode: RenderMode::Gpu,
            check_timeout: false,
            show_video: false,
            force_object_url: true,
        }
    }
}

impl PlaybackOptions {
    /// Load options from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file: {}", path.display()))?;
        let options = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse options file: {}", path.display()))?;
        Ok(options)
    }
}

/// Contents of a local file source
#[derive(Debug, Clone)]
pub enum FileData {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// In-memory or on-disk file handle supplied instead of a URL
#[derive(Debug, Clone)]
pub struct LocalFile {
    /// File name, used as resource identity
    pub name: String,
    pub data: FileData,
}

impl LocalFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            data: FileData::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: FileData::Bytes(bytes.into()),
        }
    }
}

/// Where the media comes from
#[derive(Debug, Clone)]
pub enum ResourceSource {
    Url(String),
    File(LocalFile),
}

impl ResourceSource {
    /// Resource identity (URL, or file name for local files)
    pub fn identity(&self) -> &str {
        match self {
            ResourceSource::Url(url) => url,
            ResourceSource::File(file) => &file.name,
        }
    }
}

pub type Callback = Box<dyn FnMut()>;
pub type EndCallback = Box<dyn FnMut(Option<&PlaybackError>)>;
pub type ErrorCallback = Box<dyn FnMut(&PlaybackError)>;
/// Click-to-play override: (container, media element)
pub type ClickToPlayHook = Box<dyn FnMut(&str, &mut dyn MediaElement)>;

/// Host lifecycle callbacks
#[derive(Default)]
pub struct LifecycleCallbacks {
    pub on_start: Option<Callback>,
    pub on_resume: Option<Callback>,
    pub on_pause: Option<Callback>,
    pub on_stop: Option<Callback>,
    pub on_process: Option<Callback>,
    pub on_end: Option<EndCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl fmt::Debug for LifecycleCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_resume", &self.on_resume.is_some())
            .field("on_pause", &self.on_pause.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .field("on_process", &self.on_process.is_some())
            .field("on_end", &self.on_end.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl LifecycleCallbacks {
    pub(crate) fn start(&mut self) {
        if let Some(cb) = self.on_start.as_mut() {
            cb();
        }
    }

    pub(crate) fn resume(&mut self) {
        if let Some(cb) = self.on_resume.as_mut() {
            cb();
        }
    }

    pub(crate) fn pause(&mut self) {
        if let Some(cb) = self.on_pause.as_mut() {
            cb();
        }
    }

    pub(crate) fn stop(&mut self) {
        if let Some(cb) = self.on_stop.as_mut() {
            cb();
        }
    }

    pub(crate) fn process(&mut self) {
        if let Some(cb) = self.on_process.as_mut() {
            cb();
        }
    }

    pub(crate) fn end(&mut self, err: Option<&PlaybackError>) {
        if let Some(cb) = self.on_end.as_mut() {
            cb(err);
        }
    }

    pub(crate) fn error(&mut self, err: &PlaybackError) {
        if let Some(cb) = self.on_error.as_mut() {
            cb(err);
        }
    }
}

/// Everything one playback session needs from the caller
pub struct PlaybackConfig {
    pub source: ResourceSource,
    /// Container handle the renderer draws into
    pub container: String,
    pub options: PlaybackOptions,
    pub callbacks: LifecycleCallbacks,
    pub on_request_click_play: Option<ClickToPlayHook>,
}

impl fmt::Debug for PlaybackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackConfig")
            .field("source", &self.source)
            .field("container", &self.container)
            .field("options", &self.options)
            .field("callbacks", &self.callbacks)
            .field("on_request_click_play", &self.on_request_click_play.is_some())
            .finish()
    }
}

impl PlaybackConfig {
    pub fn new(source: ResourceSource, container: impl Into<String>) -> Self {
        Self {
            source,
            container: container.into(),
            options: PlaybackOptions::default(),
            callbacks: LifecycleCallbacks::default(),
            on_request_click_play: None,
        }
    }

    pub fn url(url: impl Into<String>, container: impl Into<String>) -> Self {
        Self::new(ResourceSource::Url(url.into()), container)
    }

    pub fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_loop(mut self, loop_count: LoopCount) -> Self {
        self.options.loop_count = loop_count;
        self
    }

    pub fn with_callbacks(mut self, callbacks: LifecycleCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_click_to_play(mut self, hook: ClickToPlayHook) -> Self {
        self.on_request_click_play = Some(hook);
        self
    }

    /// Resource identity used for cache keys and logs
    pub fn identity(&self) -> &str {
        self.source.identity()
    }

    /// Both the container and the resource identifier must be non-empty
    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.container.trim().is_empty() {
            return Err(PlaybackError::configuration("container is required"));
        }
        if self.identity().trim().is_empty() {
            return Err(PlaybackError::configuration("video url is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_count_mapping() {
        assert_eq!(LoopCount::from_count(0), LoopCount::Once);
        assert_eq!(LoopCount::from_count(1), LoopCount::Once);
        assert_eq!(LoopCount::from_count(3), LoopCount::Times(3));
        assert_eq!(LoopCount::from_count(-1), LoopCount::Infinite);
        assert!(!LoopCount::Once.is_repeating());
        assert!(LoopCount::Times(2).is_repeating());
        assert!(LoopCount::Infinite.is_repeating());
        assert_eq!(LoopCount::Infinite.cycles(), None);
    }

    #[test]
    fn test_options_partial_json() {
        let json = r#"{ "loop": 3, "render_mode": "canvas2d", "check_timeout": true }"#;
        let options: PlaybackOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.loop_count, LoopCount::Times(3));
        assert_eq!(options.render_mode, RenderMode::Raster);
        assert!(options.check_timeout);
        // Untouched fields keep their defaults
        assert!(options.use_prefetch);
        assert!(options.force_object_url);
    }

    #[test]
    fn test_loop_flag_json() {
        let options: PlaybackOptions = serde_json::from_str(r#"{ "loop": true }"#).unwrap();
        assert_eq!(options.loop_count, LoopCount::Infinite);
        let options: PlaybackOptions = serde_json::from_str(r#"{ "loop": false }"#).unwrap();
        assert_eq!(options.loop_count, LoopCount::Once);
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let cfg = PlaybackConfig::url("", "stage");
        assert!(matches!(cfg.validate(), Err(PlaybackError::Configuration(_))));

        let cfg = PlaybackConfig::url("https://cdn.example.com/a.mp4", " ");
        assert!(matches!(cfg.validate(), Err(PlaybackError::Configuration(_))));

        let cfg = PlaybackConfig::url("https://cdn.example.com/a.mp4", "stage");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_local_file_identity() {
        let file = LocalFile::from_path("/tmp/clips/gift.mp4");
        assert_eq!(file.name, "gift.mp4");
        let cfg = PlaybackConfig::new(ResourceSource::File(file), "stage");
        assert_eq!(cfg.identity(), "gift.mp4");
    }
}
