//! Playback error taxonomy
//!
//! Fatal errors (configuration, network, setup) end the session; cache and
//! single autoplay failures are absorbed where they happen and only logged
//! or reported through `on_error`.

use std::fmt;

use crate::core::cache_store::CacheError;

/// Name of the rejection raised by a media element's `play()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayErrorKind {
    /// Autoplay blocked by platform policy (user gesture required)
    NotAllowed,
    /// Play request interrupted by a pause/load
    Abort,
    /// Source not playable
    NotSupported,
    Other(String),
}

impl fmt::Display for PlayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayErrorKind::NotAllowed => write!(f, "NotAllowedError"),
            PlayErrorKind::Abort => write!(f, "AbortError"),
            PlayErrorKind::NotSupported => write!(f, "NotSupportedError"),
            PlayErrorKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Rejection returned by `MediaElement::play`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayError {
    pub kind: PlayErrorKind,
    pub message: String,
}

impl PlayError {
    pub fn new(kind: PlayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_allowed() -> Self {
        Self::new(PlayErrorKind::NotAllowed, "play() failed because the user didn't interact first")
    }
}

impl fmt::Display for PlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PlayError {}

/// Where in the lifecycle a play attempt was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStep {
    /// Initial play attempt on start (host should show its own prompt)
    Muted,
    /// Retry after forcing mute on platforms that require it
    MutedRetry,
    /// Play attempt made from the `canplaythrough` signal
    CanPlayThrough,
}

impl fmt::Display for PlayStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayStep::Muted => write!(f, "muted"),
            PlayStep::MutedRetry => write!(f, "muted-retry"),
            PlayStep::CanPlayThrough => write!(f, "canplaythrough"),
        }
    }
}

/// Structured autoplay rejection delivered to `on_error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoplayRejection {
    pub reason: PlayErrorKind,
    pub step: PlayStep,
    pub message: String,
}

/// All errors surfaced by a playback session
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// Missing container or resource identifier (raised at construction)
    Configuration(String),
    /// Non-success transport status or transport failure during fetch
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },
    /// Local file could not be read
    FileRead { name: String, message: String },
    /// Cache lookup/insert failure (never fatal)
    Cache(String),
    /// Platform refused to start playback
    Autoplay(AutoplayRejection),
    /// Renderer or frame source initialisation failed
    Setup(String),
    /// Error signal emitted by the media element
    Media(String),
}

impl PlaybackError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::Network {
            url: url.into(),
            status: Some(status),
            message: format!("http response invalid {}", status),
        }
    }

    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn autoplay(error: &PlayError, step: PlayStep) -> Self {
        Self::Autoplay(AutoplayRejection {
            reason: error.kind.clone(),
            step,
            message: error.message.clone(),
        })
    }

    /// Fatal errors tear the session down
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlaybackError::Configuration(_)
                | PlaybackError::Network { .. }
                | PlaybackError::FileRead { .. }
                | PlaybackError::Setup(_)
        )
    }
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            PlaybackError::Network { url, status: Some(code), .. } => {
                write!(f, "network error: {} returned status {}", url, code)
            }
            PlaybackError::Network { url, message, .. } => {
                write!(f, "network error: {}: {}", url, message)
            }
            PlaybackError::FileRead { name, message } => {
                write!(f, "file read error: {}: {}", name, message)
            }
            PlaybackError::Cache(msg) => write!(f, "cache error: {}", msg),
            PlaybackError::Autoplay(r) => {
                write!(f, "autoplay blocked ({}, step={}): {}", r.reason, r.step, r.message)
            }
            PlaybackError::Setup(msg) => write!(f, "setup error: {}", msg),
            PlaybackError::Media(msg) => write!(f, "media error: {}", msg),
        }
    }
}

impl std::error::Error for PlaybackError {}

impl From<CacheError> for PlaybackError {
    fn from(err: CacheError) -> Self {
        Self::cache(err.to_string())
    }
}
