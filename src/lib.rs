//! ALPHAPLAY - alpha-channel video overlay playback core
//!
//! Sequences resource acquisition, persistent caching, autoplay negotiation,
//! frame hand-off to the renderer, loop/end detection and teardown for one
//! platform media element per session.

// Playback core (prefetch, cache, events, session)
pub mod core;

// Host-facing modules
pub mod cli;
pub mod config;
pub mod error;
pub mod headless;
pub mod paths;
pub mod platform;

// Re-export commonly used types
pub use config::{LifecycleCallbacks, LocalFile, LoopCount, PlaybackConfig, PlaybackOptions, RenderMode, ResourceSource};
pub use core::session::{Collaborators, Session, SessionState};
pub use core::traits::{Frame, FrameSource, FrameStrategy, MediaElement, Renderer, RendererFactory};
pub use error::{PlayError, PlayErrorKind, PlayStep, PlaybackError};
pub use platform::PlatformProfile;
