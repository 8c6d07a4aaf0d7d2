//! Platform event inbox for one session.
//!
//! Architecture:
//! - The media element, the host page and the frame source hold an
//!   `EventEmitter` and push `PlatformEvent`s from any thread
//! - The session registers which event kinds it listens to; events of kinds
//!   nobody listens to are dropped at emit time (addEventListener semantics)
//! - `Session::update()` drains the queue with `poll()` and dispatches in
//!   FIFO order
//!
//! Teardown removes listeners synchronously, so anything emitted afterwards
//! never reaches the session.

use log::{trace, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use crate::core::traits::Frame;

/// Queue length at which the oldest frames are evicted
///
/// Only `Frame` events are ever evicted; control events always stay queued.
const MAX_QUEUE_SIZE: usize = 1000;

/// Signals emitted by the platform media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    CanPlayThrough,
    Stalled,
    Playing,
    Pause,
    Resume,
    Ended,
    Progress,
    Seeked,
    Error(String),
    LoadedMetadata,
}

/// Everything the session can receive from its environment
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    Media(MediaEvent),
    /// Host page visibility changed
    Visibility { hidden: bool },
    /// Frame source produced a render opportunity
    Frame(Frame),
}

/// Listener registration key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CanPlayThrough,
    Stalled,
    Playing,
    Pause,
    Resume,
    Ended,
    Progress,
    Seeked,
    Error,
    LoadedMetadata,
    Visibility,
    Frame,
}

impl PlatformEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlatformEvent::Media(m) => match m {
                MediaEvent::CanPlayThrough => EventKind::CanPlayThrough,
                MediaEvent::Stalled => EventKind::Stalled,
                MediaEvent::Playing => EventKind::Playing,
                MediaEvent::Pause => EventKind::Pause,
                MediaEvent::Resume => EventKind::Resume,
                MediaEvent::Ended => EventKind::Ended,
                MediaEvent::Progress => EventKind::Progress,
                MediaEvent::Seeked => EventKind::Seeked,
                MediaEvent::Error(_) => EventKind::Error,
                MediaEvent::LoadedMetadata => EventKind::LoadedMetadata,
            },
            PlatformEvent::Visibility { .. } => EventKind::Visibility,
            PlatformEvent::Frame(_) => EventKind::Frame,
        }
    }
}

type Listeners = Arc<RwLock<HashSet<EventKind>>>;
type Queue = Arc<Mutex<Vec<PlatformEvent>>>;

fn push_event(listeners: &Listeners, queue: &Queue, event: PlatformEvent) -> bool {
    let kind = event.kind();
    if !listeners.read().unwrap_or_else(|e| e.into_inner()).contains(&kind) {
        trace!("EventBus: no listener for {:?}, dropped", kind);
        return false;
    }
    let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
    if queue.len() >= MAX_QUEUE_SIZE {
        let frames = queue.iter().filter(|e| is_frame(e)).count();
        if frames == 0 && is_frame(&event) {
            trace!("EventBus: queue full of control events, frame dropped");
            return false;
        }
        let mut evict_count = frames.div_ceil(2);
        warn!("EventBus queue full ({} events), evicting oldest {} frames", queue.len(), evict_count);
        queue.retain(|e| {
            if evict_count > 0 && is_frame(e) {
                evict_count -= 1;
                false
            } else {
                true
            }
        });
    }
    queue.push(event);
    true
}

fn is_frame(event: &PlatformEvent) -> bool {
    matches!(event, PlatformEvent::Frame(_))
}

/// Per-session event inbox
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Listeners,
    queue: Queue,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listening", &self.listeners.read().map(|s| s.len()).unwrap_or(0))
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting events of the given kinds
    pub fn listen(&self, kinds: &[EventKind]) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.extend(kinds.iter().copied());
    }

    /// Stop accepting events of the given kinds
    pub fn unlisten(&self, kinds: &[EventKind]) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        for kind in kinds {
            listeners.remove(kind);
        }
    }

    /// Queue an event if its kind is listened to. Returns true if queued.
    pub fn emit(&self, event: PlatformEvent) -> bool {
        push_event(&self.listeners, &self.queue, event)
    }

    /// Drain all queued events
    pub fn poll(&self) -> Vec<PlatformEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Handle for the media element / host page
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            listeners: Arc::clone(&self.listeners),
            queue: Arc::clone(&self.queue),
        }
    }
}

/// Cloneable, thread-safe handle for pushing events into a session
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Listeners,
    queue: Queue,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("queue_len", &self.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventEmitter {
    pub fn emit(&self, event: PlatformEvent) -> bool {
        push_event(&self.listeners, &self.queue, event)
    }

    pub fn media(&self, event: MediaEvent) -> bool {
        self.emit(PlatformEvent::Media(event))
    }

    pub fn visibility(&self, hidden: bool) -> bool {
        self.emit(PlatformEvent::Visibility { hidden })
    }
}

/// The frame source's `onUpdate` callback
#[derive(Clone, Debug)]
pub struct FrameSink {
    emitter: EventEmitter,
}

impl FrameSink {
    pub fn new(emitter: EventEmitter) -> Self {
        Self { emitter }
    }

    pub fn push(&self, frame: Frame) -> bool {
        self.emitter.emit(PlatformEvent::Frame(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlistened_events_are_dropped() {
        let bus = EventBus::new();
        assert!(!bus.emit(PlatformEvent::Media(MediaEvent::Playing)));
        assert_eq!(bus.queue_len(), 0);

        bus.listen(&[EventKind::Playing]);
        assert!(bus.emit(PlatformEvent::Media(MediaEvent::Playing)));
        assert!(!bus.emit(PlatformEvent::Media(MediaEvent::Pause)));
        assert_eq!(bus.poll(), vec![PlatformEvent::Media(MediaEvent::Playing)]);
        assert_eq!(bus.poll().len(), 0);
    }

    #[test]
    fn test_emitter_shares_queue_and_listeners() {
        let bus = EventBus::new();
        let emitter = bus.emitter();
        bus.listen(&[EventKind::Progress, EventKind::Visibility]);

        emitter.media(MediaEvent::Progress);
        emitter.visibility(true);
        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], PlatformEvent::Visibility { hidden: true });

        bus.unlisten(&[EventKind::Visibility]);
        assert!(!emitter.visibility(false));
    }

    #[test]
    fn test_emit_from_other_thread() {
        let bus = EventBus::new();
        bus.listen(&[EventKind::Frame]);
        let sink = FrameSink::new(bus.emitter());
        let handle = std::thread::spawn(move || {
            for i in 0..10 {
                sink.push(Frame::new(i, 0.0));
            }
        });
        handle.join().unwrap();
        assert_eq!(bus.poll().len(), 10);
    }

    #[test]
    fn test_queue_eviction() {
        let bus = EventBus::new();
        bus.listen(&[EventKind::Frame]);
        for i in 0..(MAX_QUEUE_SIZE as u32 + 10) {
            bus.emit(PlatformEvent::Frame(Frame::new(i, 0.0)));
        }
        assert!(bus.queue_len() <= MAX_QUEUE_SIZE);
        // oldest were evicted
        match bus.poll().first() {
            Some(PlatformEvent::Frame(f)) => assert!(f.index > 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_control_events_survive_frame_flood() {
        let bus = EventBus::new();
        let emitter = bus.emitter();
        bus.listen(&[EventKind::Ended, EventKind::Pause, EventKind::Frame]);
        emitter.media(MediaEvent::Pause);
        for i in 0..1200 {
            emitter.emit(PlatformEvent::Frame(Frame::new(i, 0.0)));
        }
        emitter.media(MediaEvent::Ended);

        let events = bus.poll();
        assert!(events.len() <= MAX_QUEUE_SIZE + 1);
        assert_eq!(events.first(), Some(&PlatformEvent::Media(MediaEvent::Pause)));
        assert_eq!(events.last(), Some(&PlatformEvent::Media(MediaEvent::Ended)));
        // most recent frames are kept
        assert!(events.contains(&PlatformEvent::Frame(Frame::new(1199, 0.0))));
    }

    #[test]
    fn test_full_control_queue_rejects_frames_only() {
        let bus = EventBus::new();
        bus.listen(&[EventKind::Progress, EventKind::Frame]);
        for _ in 0..MAX_QUEUE_SIZE {
            bus.emit(PlatformEvent::Media(MediaEvent::Progress));
        }
        assert!(!bus.emit(PlatformEvent::Frame(Frame::new(0, 0.0))));
        assert!(bus.emit(PlatformEvent::Media(MediaEvent::Progress)));
        assert_eq!(bus.queue_len(), MAX_QUEUE_SIZE + 1);
    }
}
