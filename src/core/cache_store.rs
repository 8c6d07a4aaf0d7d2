//! Resource cache keyed by resource identity
//!
//! Holds raw media bytes plus any decoded metadata so a repeated playback of
//! the same resource skips the network and the metadata decode. Records are
//! written once per identity and read-only afterwards; concurrent writers for
//! the same key are last-write-wins.
//!
//! Eviction is a store policy: `MemoryCacheStore` evicts least recently used
//! records past its byte budget, `DiskCacheStore` never evicts.
//!
//! **Used by**: prefetch pipeline (lookup before fetch, fire-and-forget insert)

use log::debug;
use lru::LruCache;
use once_cell::sync::Lazy;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::metadata::VideoMetadata;

/// Default byte budget of the process-wide memory store (256 MB)
const DEFAULT_MAX_BYTES: usize = 256 * 1024 * 1024;
const DEFAULT_MAX_ENTRIES: usize = 64;

static GLOBAL_STORE: Lazy<Arc<MemoryCacheStore>> =
    Lazy::new(|| Arc::new(MemoryCacheStore::new(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_BYTES)));

/// One cached resource
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub key: String,
    pub payload: Arc<[u8]>,
    pub metadata: Option<VideoMetadata>,
}

impl CacheRecord {
    pub fn new(key: impl Into<String>, payload: Arc<[u8]>, metadata: Option<VideoMetadata>) -> Self {
        Self {
            key: key.into(),
            payload,
            metadata,
        }
    }
}

/// Cache I/O errors (never fatal to playback)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    Io(String),
    Corrupt(String),
    Serde(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "Cache I/O error: {}", e),
            CacheError::Corrupt(e) => write!(f, "Corrupt cache record: {}", e),
            CacheError::Serde(e) => write!(f, "Cache index error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serde(e.to_string())
    }
}

/// Hit/miss counters
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize, bytes: usize) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
            bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub bytes: usize,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Persistent key-value store shared by every session in the process
pub trait CacheStore: Send + Sync {
    /// Look up a record; Ok(None) on miss or while disabled
    fn find(&self, key: &str) -> Result<Option<CacheRecord>, CacheError>;

    /// Insert or overwrite a record; no-op while disabled
    fn insert(&self, key: &str, record: CacheRecord) -> Result<(), CacheError>;

    /// Toggle persistence entirely
    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn stats_snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot::default()
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn find(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        (**self).find(key)
    }

    fn insert(&self, key: &str, record: CacheRecord) -> Result<(), CacheError> {
        (**self).insert(key, record)
    }

    fn set_enabled(&self, enabled: bool) {
        (**self).set_enabled(enabled)
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn stats_snapshot(&self) -> CacheStatsSnapshot {
        (**self).stats_snapshot()
    }
}

/// In-memory LRU store with entry and byte budgets
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, CacheRecord>>,
    bytes: AtomicUsize,
    max_bytes: usize,
    enabled: AtomicBool,
    stats: CacheStats,
}

impl MemoryCacheStore {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        debug!("MemoryCacheStore created: max_entries={}, max_bytes={}", cap, max_bytes);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            bytes: AtomicUsize::new(0),
            max_bytes,
            enabled: AtomicBool::new(true),
            stats: CacheStats::default(),
        }
    }

    /// Process-wide store
    pub fn global() -> Arc<MemoryCacheStore> {
        GLOBAL_STORE.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.bytes.store(0, Ordering::Relaxed);
    }
}

impl CacheStore for MemoryCacheStore {
    fn find(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let found = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        Ok(found)
    }

    fn insert(&self, key: &str, record: CacheRecord) -> Result<(), CacheError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let size = record.payload.len();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let mut total = self.bytes.load(Ordering::Relaxed) + size;
        // `push` hands back whatever it displaced: the old value for this key
        // or the LRU entry when at capacity
        if let Some((_, displaced)) = entries.push(key.to_string(), record) {
            total = total.saturating_sub(displaced.payload.len());
        }
        while total > self.max_bytes && entries.len() > 1 {
            match entries.pop_lru() {
                Some((evicted_key, evicted)) => {
                    debug!("MemoryCacheStore evicted {} ({} bytes)", evicted_key, evicted.payload.len());
                    total = total.saturating_sub(evicted.payload.len());
                }
                None => break,
            }
        }
        self.bytes.store(total, Ordering::Relaxed);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn stats_snapshot(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.len(), self.bytes())
    }
}
