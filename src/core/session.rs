//! Playback session: lifecycle state machine over one media element
//!
//! **Architecture**: Session owns the media element, renderer and frame
//! source handed to it at construction. Everything asynchronous (prefetch
//! results, media element signals, visibility changes, frames) arrives as a
//! message and is applied inside `update()`, so all state changes happen on
//! the thread that owns the session.
//!
//! ```text
//! Idle -setup-> Loading -loadedmetadata-> Ready -start/playing-> Playing <-> Paused
//!                                                     |                  |
//!                               ended / loop end / watchdog -> Stopped -> Destroyed
//! ```
//!
//! Fatal setup errors (network, file read, renderer or frame source setup)
//! invoke `on_end(Some(err))`, then `on_error(err)`, then `destroy()`.
//!
//! **Cancellation**: `destroy()` advances the session epoch. In-flight
//! prefetch jobs see a stale ticket and stop; results that still arrive are
//! dropped and any object reference they carry is revoked.
//!
//! **Used by**: embedding host (drives `update()` from its event loop),
//! `alphaplay simulate`

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{PlaybackConfig, RenderMode, ResourceSource};
use crate::core::autoplay::{self, AutoplayPlan};
use crate::core::cache_store::{CacheStore, MemoryCacheStore};
use crate::core::event_bus::{EventBus, EventEmitter, EventKind, FrameSink, MediaEvent, PlatformEvent};
use crate::core::fetcher::{HttpFetcher, ResourceFetcher};
use crate::core::loop_check::LoopChecker;
use crate::core::metadata::{MetadataDecoder, NullDecoder, VideoMetadata};
use crate::core::object_url::{LocalObjectReference, MediaSource, ObjectUrlRegistry};
use crate::core::prefetch::{PrefetchOutcome, PrefetchRequest, Prefetched, Prefetcher};
use crate::core::traits::{
    Frame, FrameSource, FrameStrategy, MediaAttributes, MediaElement, Presentation, Renderer,
    RendererFactory,
};
use crate::core::watchdog::Watchdog;
use crate::core::workers::{self, Epoch, WorkerPool};
use crate::error::{PlayError, PlayErrorKind, PlayStep, PlaybackError};
use crate::platform::PlatformProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Stopped,
    Destroyed,
}

/// Host-provided collaborators of one session
pub struct Collaborators {
    pub media: Box<dyn MediaElement>,
    pub renderers: Box<dyn RendererFactory>,
    pub frame_source: Box<dyn FrameSource>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub cache: Arc<dyn CacheStore>,
    pub decoder: Arc<dyn MetadataDecoder>,
    pub pool: Arc<dyn WorkerPool>,
    pub objects: ObjectUrlRegistry,
    pub platform: PlatformProfile,
    /// Inbox; create it up front when the media element needs an emitter
    pub bus: EventBus,
}

impl Collaborators {
    /// Process-wide defaults for everything but the platform objects
    pub fn new(
        media: Box<dyn MediaElement>,
        renderers: Box<dyn RendererFactory>,
        frame_source: Box<dyn FrameSource>,
    ) -> Self {
        Self {
            media,
            renderers,
            frame_source,
            fetcher: Arc::new(HttpFetcher::default()),
            cache: MemoryCacheStore::global(),
            decoder: Arc::new(NullDecoder),
            pool: workers::shared_pool(),
            objects: ObjectUrlRegistry::global(),
            platform: PlatformProfile::default(),
            bus: EventBus::new(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn MetadataDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_objects(mut self, objects: ObjectUrlRegistry) -> Self {
        self.objects = objects;
        self
    }

    pub fn with_platform(mut self, platform: PlatformProfile) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }
}

/// Listened to from source assignment until teardown
const SESSION_EVENTS: [EventKind; 11] = [
    EventKind::CanPlayThrough,
    EventKind::Stalled,
    EventKind::Playing,
    EventKind::Pause,
    EventKind::Resume,
    EventKind::Ended,
    EventKind::Progress,
    EventKind::Seeked,
    EventKind::Error,
    EventKind::Visibility,
    EventKind::Frame,
];

pub struct Session {
    state: SessionState,
    config: PlaybackConfig,
    /// Effective source after the codec swap
    source: ResourceSource,
    platform: PlatformProfile,
    avoid_object_url: bool,
    render_mode: RenderMode,

    media: Box<dyn MediaElement>,
    renderer: Option<Box<dyn Renderer>>,
    frame_source: Option<Box<dyn FrameSource>>,

    prefetcher: Prefetcher,
    bus: EventBus,
    epoch: Epoch,
    results_tx: Sender<PrefetchOutcome>,
    results_rx: Receiver<PrefetchOutcome>,

    object_ref: Option<LocalObjectReference>,
    media_source: Option<MediaSource>,
    metadata: Option<VideoMetadata>,
    is_hevc: bool,

    loop_checker: LoopChecker,
    watchdog: Watchdog,
    /// Play flag shared with renderer and frame source
    playing: bool,
    /// onStart already fired
    started: bool,
    /// onEnd already fired
    ended: bool,
    /// start() requested before Ready
    pending_start: bool,
    awaiting_metadata: bool,
    /// Paused because the host page went hidden
    suspended_by_visibility: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("identity", &self.source.identity())
            .field("render_mode", &self.render_mode)
            .field("playing", &self.playing)
            .field("media_source", &self.media_source)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Bind a config to its collaborators
    ///
    /// Fails only with `PlaybackError::Configuration`.
    pub fn new(mut config: PlaybackConfig, collaborators: Collaborators) -> Result<Self, PlaybackError> {
        config.validate()?;
        let Collaborators {
            mut media,
            renderers,
            frame_source,
            fetcher,
            cache,
            decoder,
            pool,
            objects,
            platform,
            bus,
        } = collaborators;

        let mut source = config.source.clone();
        let mut is_hevc = false;
        if platform.supports_hevc
            && let Some(hevc_url) = config.options.hevc_url.as_deref().filter(|u| !u.trim().is_empty())
        {
            debug!("HEVC supported, using {}", hevc_url);
            source = ResourceSource::Url(hevc_url.to_string());
            is_hevc = true;
        }
        if matches!(source, ResourceSource::File(_)) {
            config.options.use_byte_cache = false;
        }

        let loop_checker = LoopChecker::new(config.options.loop_count);
        media.configure(&MediaAttributes {
            native_loop: loop_checker.is_repeating(),
            cross_origin_anonymous: true,
            autoplay: true,
            preload_auto: true,
            plays_inline: true,
            standard_renderer: platform.needs_standard_renderer(),
        });
        media.set_presentation(if config.options.show_video {
            Presentation::Visible
        } else {
            Presentation::Hidden
        });

        let render_mode = match config.options.render_mode {
            RenderMode::Gpu if !renderers.gpu_supported() => {
                info!("GPU rendering unavailable, falling back to raster");
                RenderMode::Raster
            }
            mode => mode,
        };
        let renderer = renderers.create(render_mode);

        let avoid_object_url = platform.has_broken_object_urls() && !config.options.force_object_url;
        let (results_tx, results_rx) = crossbeam_channel::unbounded();

        info!(
            "Session created: {} (render={}, loop={:?}, prefetch={}, byte_cache={})",
            source.identity(),
            render_mode,
            config.options.loop_count,
            config.options.use_prefetch,
            config.options.use_byte_cache
        );

        Ok(Self {
            state: SessionState::Idle,
            config,
            source,
            platform,
            avoid_object_url,
            render_mode,
            media,
            renderer: Some(renderer),
            frame_source: Some(frame_source),
            prefetcher: Prefetcher::new(fetcher, cache, decoder, objects, pool),
            bus,
            epoch: Epoch::new(),
            results_tx,
            results_rx,
            object_ref: None,
            media_source: None,
            metadata: None,
            is_hevc,
            loop_checker,
            watchdog: Watchdog::new(),
            playing: false,
            started: false,
            ended: false,
            pending_start: false,
            awaiting_metadata: false,
            suspended_by_visibility: false,
        })
    }

    // === Accessors ===

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == SessionState::Destroyed
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Resource identity (after the codec swap)
    pub fn identity(&self) -> &str {
        self.source.identity()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn is_hevc(&self) -> bool {
        self.is_hevc
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    /// Source assigned to the media element
    pub fn media_source(&self) -> Option<&MediaSource> {
        self.media_source.as_ref()
    }

    pub fn has_object_reference(&self) -> bool {
        self.object_ref.is_some()
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn frame_strategy(&self) -> Option<FrameStrategy> {
        self.frame_source.as_ref().map(|f| f.strategy())
    }

    pub fn loop_checker(&self) -> &LoopChecker {
        &self.loop_checker
    }

    pub fn watchdog_armed(&self) -> bool {
        self.watchdog.is_armed()
    }

    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// Handle for the media element / host page to post events
    pub fn emitter(&self) -> EventEmitter {
        self.bus.emitter()
    }

    // === Lifecycle ===

    /// Begin loading: Idle -> Loading
    ///
    /// Never fails; fatal errors are delivered through the callbacks and
    /// leave the session destroyed.
    pub fn setup(&mut self) {
        match self.state {
            SessionState::Idle => {}
            SessionState::Destroyed => return self.log_destroyed("setup"),
            state => {
                debug!("setup() ignored in {:?}", state);
                return;
            }
        }
        debug!("=== session setup: {} ===", self.identity());
        self.state = SessionState::Loading;

        if self.config.options.use_prefetch {
            let request = PrefetchRequest {
                source: self.source.clone(),
                use_byte_cache: self.config.options.use_byte_cache,
                use_metadata: self.config.options.use_metadata,
                avoid_object_url: self.avoid_object_url,
            };
            self.prefetcher
                .spawn(request, self.epoch.ticket(), self.results_tx.clone());
        } else {
            let direct = MediaSource::Direct(self.identity().to_string());
            self.assign_source(Prefetched {
                source: direct,
                reference: None,
                metadata: None,
                from_cache: false,
            });
        }
        self.update();
    }

    /// Request playback now
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// `start()` with an explicit clock (watchdog arming time)
    pub fn start_at(&mut self, now: Instant) {
        match self.state {
            SessionState::Destroyed => self.log_destroyed("start"),
            SessionState::Idle | SessionState::Loading => {
                debug!("start() before ready, deferred");
                self.pending_start = true;
            }
            SessionState::Ready | SessionState::Paused => {
                self.suspended_by_visibility = false;
                self.enter_playing(now, true);
            }
            SessionState::Playing => trace!("start() while playing"),
            SessionState::Stopped => debug!("start() after stop, ignored"),
        }
    }

    /// Explicit pause: Playing -> Paused, fires on_stop
    pub fn stop(&mut self) {
        match self.state {
            SessionState::Destroyed => self.log_destroyed("stop"),
            SessionState::Playing => {
                self.suspended_by_visibility = false;
                self.enter_paused();
                self.config.callbacks.stop();
            }
            SessionState::Idle | SessionState::Loading => self.pending_start = false,
            state => trace!("stop() ignored in {:?}", state),
        }
    }

    /// Tear everything down. Idempotent.
    pub fn destroy(&mut self) {
        if self.state == SessionState::Destroyed {
            return self.log_destroyed("destroy");
        }
        debug!("[destroy] {}", self.identity());
        self.epoch.advance();

        if let Some(reference) = self.object_ref.take() {
            self.prefetcher.objects().revoke(reference);
        }
        self.set_play(false);
        self.remove_listeners();

        self.media.pause();
        if self.config.options.video_id.is_none() && !self.platform.keeps_media_element() {
            self.media.clear_source();
            self.media.load();
            self.media.release();
        }
        if let Some(mut renderer) = self.renderer.take() {
            renderer.destroy();
        }
        if let Some(mut frames) = self.frame_source.take() {
            frames.destroy();
        }
        self.watchdog.disarm();
        self.drain_stale_results();

        self.pending_start = false;
        self.media_source = None;
        self.state = SessionState::Destroyed;
    }

    /// Apply pending messages and timers
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    /// `update()` with an explicit clock
    pub fn update_at(&mut self, now: Instant) {
        if self.state == SessionState::Destroyed {
            self.drain_stale_results();
            return;
        }
        while let Ok(outcome) = self.results_rx.try_recv() {
            self.apply_prefetch(outcome);
        }
        for event in self.bus.poll() {
            if self.state == SessionState::Destroyed {
                break;
            }
            self.dispatch(event, now);
        }
        if self.state == SessionState::Playing && self.watchdog.tick(now) {
            info!("Watchdog timeout, ending {}", self.identity());
            self.finish_playback();
        }
    }

    // === Loading ===

    fn apply_prefetch(&mut self, outcome: PrefetchOutcome) {
        if outcome.epoch != self.epoch.current() || self.state != SessionState::Loading {
            debug!("Dropping stale prefetch result (epoch {})", outcome.epoch);
            self.release_outcome(outcome);
            return;
        }
        match outcome.result {
            Ok(Some(prefetched)) => self.assign_source(prefetched),
            Ok(None) => debug!("Prefetch abandoned"),
            Err(e) => self.fail_setup(e),
        }
    }

    fn release_outcome(&self, outcome: PrefetchOutcome) {
        if let Ok(Some(prefetched)) = outcome.result
            && let Some(reference) = prefetched.reference
        {
            self.prefetcher.objects().revoke(reference);
        }
    }

    fn drain_stale_results(&self) {
        while let Ok(outcome) = self.results_rx.try_recv() {
            self.release_outcome(outcome);
        }
    }

    /// Prefetch continuation: source, metadata, mute, listeners
    fn assign_source(&mut self, prefetched: Prefetched) {
        let Prefetched {
            source,
            reference,
            metadata,
            from_cache,
        } = prefetched;
        debug!("[prefetch url] {} (cache={})", source.as_str(), from_cache);

        if let Some(meta) = metadata {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.set_config(&meta);
            }
            if meta.is_hevc {
                self.is_hevc = true;
            }
            self.metadata = Some(meta);
        }
        self.object_ref = reference;
        self.media.set_source(&source);
        self.media_source = Some(source);

        let has_audio = self.metadata.as_ref().is_some_and(|m| m.has_audio);
        let muted = !has_audio || self.config.options.mute.unwrap_or(false);
        self.media.set_muted(muted);

        // subscribe before load: an element may signal synchronously
        self.bus.listen(&SESSION_EVENTS);
        self.bus.listen(&[EventKind::LoadedMetadata]);
        self.awaiting_metadata = true;
        self.media.load();
        debug!("[video load] muted={}", muted);
    }

    /// loadedmetadata continuation: renderer, frame source, Ready
    fn finish_setup(&mut self, now: Instant) {
        self.awaiting_metadata = false;
        if !self.platform.freezes_on_metadata_wait() {
            self.bus.unlisten(&[EventKind::LoadedMetadata]);
        }

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if let Err(e) = renderer.setup(self.media.as_mut()) {
            return self.fail_setup(PlaybackError::setup(format!("renderer: {:#}", e)));
        }
        let sink = FrameSink::new(self.bus.emitter());
        let Some(frames) = self.frame_source.as_mut() else {
            return;
        };
        if let Err(e) = frames.setup(sink) {
            return self.fail_setup(PlaybackError::setup(format!("frame source: {:#}", e)));
        }
        let strategy = frames.strategy();

        let total = self
            .metadata
            .as_ref()
            .and_then(|m| m.frames_per_cycle(self.media.duration()));
        self.loop_checker.set_total_frames(total);

        let cached = self.config.options.use_frame_cache
            && self.renderer.as_ref().is_some_and(|r| r.frame_cache_hit());
        if self.render_mode == RenderMode::Gpu
            && strategy != FrameStrategy::VideoFrameCallback
            && !self.config.options.show_video
            && !cached
        {
            self.media.set_presentation(Presentation::Minimized);
        }

        debug!("[setup] ready: strategy={:?}, render={}", strategy, self.render_mode);
        self.state = SessionState::Ready;
        if std::mem::take(&mut self.pending_start) {
            self.start_at(now);
        }
    }

    /// onEnd(err) -> onError(err) -> destroy()
    fn fail_setup(&mut self, err: PlaybackError) {
        error!("Setup failed for {}: {}", self.identity(), err);
        if !self.ended {
            self.ended = true;
            self.config.callbacks.end(Some(&err));
        }
        self.config.callbacks.error(&err);
        self.destroy();
    }

    // === Playback ===

    fn set_play(&mut self, playing: bool) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_playing(playing);
        }
        if let Some(frames) = self.frame_source.as_mut() {
            frames.set_playing(playing);
        }
        self.playing = playing;
    }

    /// Ready/Paused -> Playing
    fn enter_playing(&mut self, now: Instant, request_play: bool) {
        self.set_play(true);
        if let Some(frames) = self.frame_source.as_mut() {
            frames.start();
        }
        self.arm_watchdog(now);
        self.state = SessionState::Playing;

        if self.started {
            self.config.callbacks.resume();
        } else {
            self.started = true;
            self.config.callbacks.start();
        }
        if self.state != SessionState::Playing || !request_play {
            return;
        }
        match self.media.play() {
            Ok(()) => debug!("play() ok (muted={})", self.media.is_muted()),
            Err(e) => self.handle_play_rejection(e),
        }
    }

    /// Playing -> Paused (no callback)
    fn enter_paused(&mut self) {
        self.set_play(false);
        if let Some(frames) = self.frame_source.as_mut() {
            frames.stop();
        }
        self.media.pause();
        self.watchdog.disarm();
        self.state = SessionState::Paused;
    }

    fn arm_watchdog(&mut self, now: Instant) {
        if !self.loop_checker.is_repeating() && self.config.options.check_timeout {
            self.watchdog.arm(self.media.duration(), now);
        }
    }

    fn handle_play_rejection(&mut self, rejection: PlayError) {
        warn!("play() rejected for {}: {}", self.identity(), rejection);
        match autoplay::negotiate(&self.platform, &rejection) {
            AutoplayPlan::MutedRetry => {
                debug!("Retrying muted");
                self.media.set_muted(true);
                if let Err(retry) = self.media.play() {
                    warn!("Muted retry rejected: {}", retry);
                    self.config
                        .callbacks
                        .error(&PlaybackError::autoplay(&retry, PlayStep::MutedRetry));
                }
            }
            AutoplayPlan::ClickToPlay { notify_blocked } => {
                if notify_blocked {
                    self.config
                        .callbacks
                        .error(&PlaybackError::autoplay(&rejection, PlayStep::Muted));
                }
                self.request_click_to_play();
            }
        }
    }

    fn request_click_to_play(&mut self) {
        let container = self.config.container.as_str();
        match self.config.on_request_click_play.as_mut() {
            Some(hook) => hook(container, self.media.as_mut()),
            None => self.media.attach_click_to_play(container),
        }
    }

    /// Natural end: Stopped, destroy, on_end once
    fn finish_playback(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        debug!("[end] {}", self.identity());
        if self.state == SessionState::Playing {
            self.enter_paused();
        }
        self.state = SessionState::Stopped;
        self.destroy();
        if !self.ended {
            self.ended = true;
            self.config.callbacks.end(None);
        }
    }

    // === Events ===

    fn dispatch(&mut self, event: PlatformEvent, now: Instant) {
        trace!("[{:?}]", event.kind());
        match event {
            PlatformEvent::Media(media) => self.on_media_event(media, now),
            PlatformEvent::Visibility { hidden } => self.on_visibility(hidden, now),
            PlatformEvent::Frame(frame) => self.on_frame(&frame),
        }
    }

    fn on_media_event(&mut self, event: MediaEvent, now: Instant) {
        match event {
            MediaEvent::LoadedMetadata => {
                if self.state == SessionState::Loading && self.awaiting_metadata {
                    self.finish_setup(now);
                }
            }
            MediaEvent::CanPlayThrough => self.on_can_play_through(),
            MediaEvent::Stalled => self.media.load(),
            MediaEvent::Playing => {
                if matches!(self.state, SessionState::Ready | SessionState::Paused) {
                    self.suspended_by_visibility = false;
                    self.enter_playing(now, false);
                }
            }
            MediaEvent::Resume => {
                if self.state == SessionState::Paused {
                    self.suspended_by_visibility = false;
                    self.enter_playing(now, false);
                }
            }
            MediaEvent::Pause => {
                if self.state == SessionState::Playing {
                    self.enter_paused();
                    self.config.callbacks.pause();
                }
            }
            MediaEvent::Ended => {
                if matches!(self.state, SessionState::Playing | SessionState::Paused) {
                    self.finish_playback();
                }
            }
            MediaEvent::Progress => self.config.callbacks.process(),
            MediaEvent::Seeked => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.video_seeked();
                }
            }
            MediaEvent::Error(message) => {
                warn!("Media error on {}: {}", self.identity(), message);
                self.config.callbacks.error(&PlaybackError::media(message));
            }
        }
    }

    fn on_can_play_through(&mut self) {
        let may_play = matches!(
            self.state,
            SessionState::Loading | SessionState::Ready | SessionState::Playing
        );
        if !may_play || !self.media.is_paused() {
            return;
        }
        if let Err(e) = self.media.play() {
            warn!("play() from canplaythrough rejected: {}", e);
            if e.kind == PlayErrorKind::NotAllowed {
                self.config
                    .callbacks
                    .error(&PlaybackError::autoplay(&e, PlayStep::CanPlayThrough));
            }
        }
    }

    fn on_visibility(&mut self, hidden: bool, now: Instant) {
        debug!("[visibilitychange] hidden={}", hidden);
        if hidden {
            if self.state == SessionState::Playing {
                self.enter_paused();
                self.suspended_by_visibility = true;
                self.config.callbacks.pause();
            }
        } else if self.state == SessionState::Paused && self.suspended_by_visibility {
            self.suspended_by_visibility = false;
            self.enter_playing(now, true);
        }
    }

    fn on_frame(&mut self, frame: &Frame) {
        if self.state != SessionState::Playing {
            return;
        }
        let decision = self.loop_checker.update_frame(frame);
        if decision.forward
            && let Some(renderer) = self.renderer.as_mut()
        {
            renderer.render(frame);
        }
        if decision.ended {
            self.finish_playback();
        }
    }

    fn remove_listeners(&mut self) {
        self.bus.unlisten(&SESSION_EVENTS);
        // WebViews that hang the metadata wait keep that one subscription
        if !(self.awaiting_metadata && self.platform.freezes_on_metadata_wait()) {
            self.bus.unlisten(&[EventKind::LoadedMetadata]);
        }
        self.bus.poll();
    }

    fn log_destroyed(&self, op: &str) {
        debug!("{}(): session destroyed", op);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != SessionState::Destroyed {
            self.destroy();
        }
        self.drain_stale_results();
    }
}
