//! Local object references: revocable handles that let a byte payload be
//! addressed like a normal playable source.
//!
//! A `LocalObjectReference` is move-only; `ObjectUrlRegistry::revoke` consumes
//! it, so each creation is released at most once by construction.

use log::{debug, trace};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const URL_PREFIX: &str = "blob:alphaplay/";

/// Process-wide registry shared by all sessions
static GLOBAL_REGISTRY: Lazy<ObjectUrlRegistry> = Lazy::new(ObjectUrlRegistry::new);

/// Handle to a payload registered in an `ObjectUrlRegistry`
#[derive(Debug, PartialEq, Eq)]
pub struct LocalObjectReference {
    url: String,
    len: usize,
}

impl LocalObjectReference {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Source assigned to the media element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Local object URL created from fetched/cached bytes
    ObjectUrl(String),
    /// Resource identifier streamed directly by the platform
    Direct(String),
}

impl MediaSource {
    pub fn as_str(&self) -> &str {
        match self {
            MediaSource::ObjectUrl(url) | MediaSource::Direct(url) => url,
        }
    }
}

struct ObjectEntry {
    bytes: Arc<[u8]>,
    mime: String,
}

/// Registry of live object URLs
#[derive(Clone)]
pub struct ObjectUrlRegistry {
    entries: Arc<Mutex<HashMap<String, ObjectEntry>>>,
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectUrlRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectUrlRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Shared process-wide registry
    pub fn global() -> ObjectUrlRegistry {
        GLOBAL_REGISTRY.clone()
    }

    /// Register a payload and return its reference
    pub fn create(&self, bytes: Arc<[u8]>, mime: &str) -> LocalObjectReference {
        let url = format!("{}{}", URL_PREFIX, Uuid::new_v4());
        let len = bytes.len();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.clone(), ObjectEntry { bytes, mime: mime.to_string() });
        debug!("createObjectURL: {} ({} bytes)", url, len);
        LocalObjectReference { url, len }
    }

    /// Release a reference. Returns false if it was not registered here.
    pub fn revoke(&self, reference: LocalObjectReference) -> bool {
        let removed = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&reference.url)
            .is_some();
        trace!("revokeObjectURL: {} (removed={})", reference.url, removed);
        removed
    }

    /// Look up the payload behind an object URL (used by media element impls)
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .map(|entry| Arc::clone(&entry.bytes))
    }

    pub fn mime(&self, url: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .map(|entry| entry.mime.clone())
    }

    pub fn live_count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}
