//! Collaborator contracts consumed by the playback core.
//!
//! The media element, renderers and frame source are owned by the host
//! platform. The session talks to them only through these traits, and they
//! talk back only through an `EventEmitter`.

use anyhow::Result;

use crate::config::RenderMode;
use crate::core::event_bus::FrameSink;
use crate::core::metadata::VideoMetadata;
use crate::core::object_url::MediaSource;
use crate::error::PlayError;

/// Render opportunity produced by the frame source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Frame index within the current cycle
    pub index: u32,
    /// Media timestamp in seconds
    pub media_time: f64,
}

impl Frame {
    pub fn new(index: u32, media_time: f64) -> Self {
        Self { index, media_time }
    }
}

/// Visibility treatment of the media element itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Element visible in the page
    Visible,
    /// Moved off-screen and hidden
    Hidden,
    /// Pinned to a 2x2 near-transparent box so the platform keeps decoding
    Minimized,
}

/// Attributes applied to the media element before loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttributes {
    /// Native loop flag
    pub native_loop: bool,
    pub cross_origin_anonymous: bool,
    pub autoplay: bool,
    /// Preload the whole resource
    pub preload_auto: bool,
    /// Inline playback (no forced fullscreen on mobile)
    pub plays_inline: bool,
    /// Standard renderer hint for inline playback on some mobile browsers
    pub standard_renderer: bool,
}

/// Platform playable element (e.g. an HTML video element)
pub trait MediaElement {
    fn configure(&mut self, attrs: &MediaAttributes);
    fn set_presentation(&mut self, presentation: Presentation);
    fn set_source(&mut self, source: &MediaSource);
    fn clear_source(&mut self);
    fn load(&mut self);
    /// Request playback; Err when the platform rejects it
    fn play(&mut self) -> std::result::Result<(), PlayError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    fn is_muted(&self) -> bool;
    /// Media duration in seconds, None until known
    fn duration(&self) -> Option<f64>;
    /// Default user-gesture capture surface that re-attempts play
    fn attach_click_to_play(&mut self, container: &str);
    /// Detach the element from the page
    fn release(&mut self);
}

/// Renderer capability set, implemented by both GPU and raster variants
pub trait Renderer {
    fn setup(&mut self, media: &mut dyn MediaElement) -> Result<()>;
    fn render(&mut self, frame: &Frame);
    /// Apply decoded metadata (video entity config)
    fn set_config(&mut self, metadata: &VideoMetadata);
    /// Media element seeked (native loop restarted)
    fn video_seeked(&mut self);
    fn set_playing(&mut self, playing: bool);
    fn is_playing(&self) -> bool;
    /// Renderer has every frame cached and no longer needs the element on screen
    fn frame_cache_hit(&self) -> bool {
        false
    }
    fn destroy(&mut self);
}

/// Creates renderers after a single upfront capability probe
pub trait RendererFactory {
    fn gpu_supported(&self) -> bool;
    fn create(&self, mode: RenderMode) -> Box<dyn Renderer>;
}

/// Timing primitive used by a frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStrategy {
    /// Native per-video-frame callback
    VideoFrameCallback,
    /// Display refresh callback
    AnimationFrame,
    /// Plain timer
    Timer,
}

/// Forward-only producer of render opportunities ("animator")
pub trait FrameSource {
    /// Frames are delivered through `sink` once started
    fn setup(&mut self, sink: FrameSink) -> Result<()>;
    fn start(&mut self);
    fn stop(&mut self);
    fn set_playing(&mut self, playing: bool);
    fn strategy(&self) -> FrameStrategy;
    fn destroy(&mut self);
}
