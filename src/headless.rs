//! Headless collaborators: a simulated media element, a counting renderer
//! and a timer-driven frame source
//!
//! Used by `alphaplay simulate` to exercise a full session without a page,
//! and by end-to-end tests.

use anyhow::{Result, bail};
use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{debug, info, trace};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::RenderMode;
use crate::core::event_bus::{EventEmitter, FrameSink, MediaEvent};
use crate::core::metadata::VideoMetadata;
use crate::core::object_url::{MediaSource, ObjectUrlRegistry};
use crate::core::traits::{
    Frame, FrameSource, FrameStrategy, MediaAttributes, MediaElement, Presentation, Renderer,
    RendererFactory,
};
use crate::error::PlayError;

/// Simulated media element
///
/// Emits `loadedmetadata` + `canplaythrough` on load and `playing`/`pause`
/// on state changes. Unmuted autoplay is refused unless allowed; muted
/// autoplay always succeeds.
pub struct HeadlessMedia {
    emitter: EventEmitter,
    objects: ObjectUrlRegistry,
    duration: f64,
    allow_unmuted_autoplay: bool,
    /// Perform the user gesture as soon as click-to-play is attached
    auto_click: bool,
    source: Option<MediaSource>,
    paused: bool,
    muted: bool,
}

impl HeadlessMedia {
    pub fn new(emitter: EventEmitter, objects: ObjectUrlRegistry, duration: f64) -> Self {
        Self {
            emitter,
            objects,
            duration,
            allow_unmuted_autoplay: true,
            auto_click: true,
            source: None,
            paused: true,
            muted: false,
        }
    }

    pub fn with_autoplay_policy(mut self, allow_unmuted: bool, auto_click: bool) -> Self {
        self.allow_unmuted_autoplay = allow_unmuted;
        self.auto_click = auto_click;
        self
    }
}

impl MediaElement for HeadlessMedia {
    fn configure(&mut self, attrs: &MediaAttributes) {
        debug!("[media] configure {:?}", attrs);
    }

    fn set_presentation(&mut self, presentation: Presentation) {
        trace!("[media] presentation {:?}", presentation);
    }

    fn set_source(&mut self, source: &MediaSource) {
        self.source = Some(source.clone());
    }

    fn clear_source(&mut self) {
        self.source = None;
    }

    fn load(&mut self) {
        let Some(source) = &self.source else {
            return;
        };
        if let MediaSource::ObjectUrl(url) = source {
            let (Some(bytes), Some(mime)) = (self.objects.resolve(url), self.objects.mime(url)) else {
                self.emitter.media(MediaEvent::Error(format!("{} is not a live object URL", url)));
                return;
            };
            if !mime.starts_with("video/") {
                self.emitter.media(MediaEvent::Error(format!("unsupported type {}", mime)));
                return;
            }
            debug!("[media] load {} ({} bytes, {})", url, bytes.len(), mime);
        } else {
            debug!("[media] load {} (streamed)", source.as_str());
        }
        self.emitter.media(MediaEvent::LoadedMetadata);
        self.emitter.media(MediaEvent::CanPlayThrough);
    }

    fn play(&mut self) -> std::result::Result<(), PlayError> {
        if !self.muted && !self.allow_unmuted_autoplay {
            return Err(PlayError::not_allowed());
        }
        if self.paused {
            self.paused = false;
            self.emitter.media(MediaEvent::Playing);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.emitter.media(MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn duration(&self) -> Option<f64> {
        self.source.as_ref().map(|_| self.duration)
    }

    fn attach_click_to_play(&mut self, container: &str) {
        info!("[media] click-to-play attached to {}", container);
        if self.auto_click {
            // a user gesture lifts the autoplay restriction
            self.allow_unmuted_autoplay = true;
            let _ = self.play();
        }
    }

    fn release(&mut self) {
        debug!("[media] released");
    }
}

/// Renderer that only counts
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    rendered: Arc<AtomicUsize>,
    metadata: Option<VideoMetadata>,
    ready: bool,
    playing: bool,
}

impl Renderer for HeadlessRenderer {
    fn setup(&mut self, _media: &mut dyn MediaElement) -> Result<()> {
        self.ready = true;
        Ok(())
    }

    fn render(&mut self, frame: &Frame) {
        if self.ready {
            self.rendered.fetch_add(1, Ordering::Relaxed);
            trace!("[render] frame {} @ {:.3}s", frame.index, frame.media_time);
        }
    }

    fn set_config(&mut self, metadata: &VideoMetadata) {
        self.metadata = Some(metadata.clone());
    }

    fn video_seeked(&mut self) {
        trace!("[render] seeked");
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn destroy(&mut self) {
        self.ready = false;
    }
}

/// Creates `HeadlessRenderer`s sharing one frame counter
#[derive(Debug, Clone)]
pub struct HeadlessRendererFactory {
    gpu: bool,
    rendered: Arc<AtomicUsize>,
}

impl HeadlessRendererFactory {
    pub fn new(gpu: bool) -> Self {
        Self {
            gpu,
            rendered: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frames rendered by every renderer this factory created
    pub fn rendered(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.rendered)
    }
}

impl RendererFactory for HeadlessRendererFactory {
    fn gpu_supported(&self) -> bool {
        self.gpu
    }

    fn create(&self, mode: RenderMode) -> Box<dyn Renderer> {
        debug!("[render] create {}", mode);
        Box::new(HeadlessRenderer {
            rendered: Arc::clone(&self.rendered),
            ..Default::default()
        })
    }
}

/// Frame source ticking at a fixed rate on its own thread
pub struct TimerFrameSource {
    fps: f64,
    frames_per_cycle: u32,
    sink: Option<FrameSink>,
    playing: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TimerFrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerFrameSource")
            .field("fps", &self.fps)
            .field("frames_per_cycle", &self.frames_per_cycle)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl TimerFrameSource {
    pub fn new(fps: f64, frames_per_cycle: u32) -> Self {
        Self {
            fps,
            frames_per_cycle: frames_per_cycle.max(1),
            sink: None,
            playing: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            handle: None,
        }
    }
}

impl FrameSource for TimerFrameSource {
    fn setup(&mut self, sink: FrameSink) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            bail!("invalid frame rate {}", self.fps);
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let interval = Duration::from_secs_f64(1.0 / self.fps);
        let fps = self.fps;
        let total = self.frames_per_cycle;
        let playing = Arc::clone(&self.playing);

        let spawned = thread::Builder::new()
            .name("alphaplay-frames".into())
            .spawn(move || {
                let started = Instant::now();
                let mut tick: u64 = 0;
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                    if !playing.load(Ordering::Relaxed) {
                        continue;
                    }
                    let index = (tick % total as u64) as u32;
                    tick += 1;
                    let media_time = index as f64 / fps;
                    trace!("[frames] {} ({:?} since start)", index, started.elapsed());
                    sink.push(Frame::new(index, media_time));
                }
            });
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.stop_tx = Some(stop_tx);
            }
            Err(e) => log::error!("Failed to spawn frame thread: {}", e),
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    fn strategy(&self) -> FrameStrategy {
        FrameStrategy::Timer
    }

    fn destroy(&mut self) {
        self.stop();
        self.sink = None;
    }
}

impl Drop for TimerFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}
