//! Playback core - prefetch, caching, event inbox, session state machine
//!
//! Independent of any concrete platform: the media element, renderers and
//! frame source are reached only through `traits`.

pub mod autoplay;
pub mod cache_store;
pub mod disk_cache;
pub mod event_bus;
pub mod fetcher;
pub mod loop_check;
pub mod metadata;
pub mod object_url;
pub mod prefetch;
pub mod session;
pub mod traits;
pub mod watchdog;
pub mod workers;

// Re-exports for convenience
pub use cache_store::{CacheError, CacheRecord, CacheStore, MemoryCacheStore};
pub use disk_cache::DiskCacheStore;
pub use event_bus::{EventBus, EventEmitter, FrameSink, MediaEvent, PlatformEvent};
pub use fetcher::{HttpFetcher, ResourceFetcher};
pub use loop_check::{LoopChecker, LoopDecision};
pub use metadata::{MetadataDecoder, NullDecoder, VideoMetadata};
pub use object_url::{LocalObjectReference, MediaSource, ObjectUrlRegistry};
pub use prefetch::{PrefetchRequest, Prefetched, Prefetcher};
pub use session::{Collaborators, Session, SessionState};
pub use watchdog::Watchdog;
pub use workers::{Epoch, InlinePool, WorkerPool, Workers};
