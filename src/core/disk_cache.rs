//! Persistent cache store on disk
//!
//! Layout under the cache directory, one pair of files per resource:
//! - `<id>.bin`  raw payload
//! - `<id>.json` sidecar `{ key, size, metadata }`
//!
//! `<id>` is a name-based UUID of the resource identity, so the same URL
//! always maps to the same files across processes. Payloads and sidecars are
//! both written to a temp file and renamed into place; a reader never sees a
//! partial record.

use indexmap::IndexMap;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::core::cache_store::{CacheError, CacheRecord, CacheStats, CacheStatsSnapshot, CacheStore};
use crate::core::metadata::VideoMetadata;

const PAYLOAD_EXT: &str = "bin";
const SIDECAR_EXT: &str = "json";

/// Sidecar contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskEntry {
    pub key: String,
    pub size: usize,
    #[serde(default)]
    pub metadata: Option<VideoMetadata>,
}

/// Directory-backed `CacheStore`
#[derive(Debug)]
pub struct DiskCacheStore {
    dir: PathBuf,
    /// key -> entry, in insertion order
    index: Mutex<IndexMap<String, DiskEntry>>,
    enabled: AtomicBool,
    stats: CacheStats,
}

/// File stem for a resource identity
pub fn entry_id(key: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).simple().to_string()
}

impl DiskCacheStore {
    /// Open (creating if needed) a cache directory and load its index
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let index = scan_dir(&dir)?;
        debug!("DiskCacheStore opened {}: {} entries", dir.display(), index.len());
        Ok(Self {
            dir,
            index: Mutex::new(index),
            enabled: AtomicBool::new(true),
            stats: CacheStats::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", entry_id(key), PAYLOAD_EXT))
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", entry_id(key), SIDECAR_EXT))
    }

    /// All entries in insertion order
    pub fn list(&self) -> Vec<DiskEntry> {
        self.index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes on disk
    pub fn total_bytes(&self) -> usize {
        self.index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|e| e.size)
            .sum()
    }

    /// Remove one entry. Returns true if it existed.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self
            .index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .shift_remove(key)
            .is_some();
        remove_if_exists(&self.payload_path(key))?;
        remove_if_exists(&self.sidecar_path(key))?;
        if existed {
            debug!("DiskCacheStore removed {}", key);
        }
        Ok(existed)
    }

    /// Remove every entry. Returns number removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let keys: Vec<String> = self
            .index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        for key in &keys {
            self.remove(key)?;
        }
        debug!("DiskCacheStore cleared {} entries", keys.len());
        Ok(keys.len())
    }
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write to `<stem>.<uuid>.tmp` next to `path`, then rename over it
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    let written = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn scan_dir(dir: &Path) -> Result<IndexMap<String, DiskEntry>, CacheError> {
    let mut sidecars: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == SIDECAR_EXT))
        .collect();
    sidecars.sort();

    let mut index = IndexMap::new();
    for path in sidecars {
        let parsed = fs::read_to_string(&path)
            .map_err(CacheError::from)
            .and_then(|json| serde_json::from_str::<DiskEntry>(&json).map_err(CacheError::from));
        match parsed {
            Ok(entry) => {
                index.insert(entry.key.clone(), entry);
            }
            // One bad sidecar must not make the whole cache unusable
            Err(e) => warn!("Skipping cache sidecar {}: {}", path.display(), e),
        }
    }
    Ok(index)
}

impl CacheStore for DiskCacheStore {
    fn find(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let entry = self
            .index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        let Some(entry) = entry else {
            self.stats.record_miss();
            return Ok(None);
        };

        let payload = match fs::read(self.payload_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.stats.record_miss();
                return Err(CacheError::Corrupt(format!("payload missing for {}", key)));
            }
            Err(e) => return Err(e.into()),
        };
        if payload.len() != entry.size {
            return Err(CacheError::Corrupt(format!(
                "{}: expected {} bytes, found {}",
                key,
                entry.size,
                payload.len()
            )));
        }
        self.stats.record_hit();
        trace!("DiskCacheStore hit {} ({} bytes)", key, payload.len());
        Ok(Some(CacheRecord::new(key, Arc::from(payload), entry.metadata)))
    }

    fn insert(&self, key: &str, record: CacheRecord) -> Result<(), CacheError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let entry = DiskEntry {
            key: key.to_string(),
            size: record.payload.len(),
            metadata: record.metadata,
        };

        write_atomic(&self.payload_path(key), &record.payload)?;
        write_atomic(&self.sidecar_path(key), serde_json::to_string_pretty(&entry)?.as_bytes())?;

        debug!("DiskCacheStore stored {} ({} bytes)", key, entry.size);
        self.index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), entry);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn stats_snapshot(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.len(), self.total_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://cdn.example.com/gift.mp4";

    fn record(bytes: &[u8], metadata: Option<VideoMetadata>) -> CacheRecord {
        CacheRecord::new(URL, Arc::from(bytes.to_vec()), metadata)
    }

    #[test]
    fn test_entry_id_is_stable() {
        assert_eq!(entry_id(URL), entry_id(URL));
        assert_ne!(entry_id(URL), entry_id("https://cdn.example.com/other.mp4"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let meta = VideoMetadata { has_audio: true, frames: Some(60), ..Default::default() };
        {
            let store = DiskCacheStore::open(tmp.path()).unwrap();
            store.insert(URL, record(b"abcdef", Some(meta.clone()))).unwrap();
        }
        let store = DiskCacheStore::open(tmp.path()).unwrap();
        assert_eq!(store.len(), 1);
        let found = store.find(URL).unwrap().unwrap();
        assert_eq!(&*found.payload, b"abcdef");
        assert_eq!(found.metadata, Some(meta));
    }

    #[test]
    fn test_miss_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(tmp.path()).unwrap();
        assert!(store.find(URL).unwrap().is_none());

        store.insert(URL, record(b"x", None)).unwrap();
        assert!(store.remove(URL).unwrap());
        assert!(!store.remove(URL).unwrap());
        assert!(store.find(URL).unwrap().is_none());
        assert!(!tmp.path().join(format!("{}.bin", entry_id(URL))).exists());
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(tmp.path()).unwrap();
        store.insert(URL, record(b"0123456789", None)).unwrap();
        fs::write(tmp.path().join(format!("{}.bin", entry_id(URL))), b"0123").unwrap();
        assert!(matches!(store.find(URL), Err(CacheError::Corrupt(_))));
    }

    #[test]
    fn test_sidecar_rewrite_is_atomic() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(tmp.path()).unwrap();
        store.insert(URL, record(b"first", None)).unwrap();
        store.insert(URL, record(b"second!", None)).unwrap();
        let leftovers = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(leftovers, 0);

        // a write interrupted before its rename leaves only a temp file behind
        let id = entry_id(URL);
        fs::write(tmp.path().join(format!("{}.0badc0de.tmp", id)), "{ \"key\": \"htt").unwrap();
        let reopened = DiskCacheStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(&*reopened.find(URL).unwrap().unwrap().payload, b"second!");
    }

    #[test]
    fn test_bad_sidecar_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("garbage.json"), "{ not json").unwrap();
        let store = DiskCacheStore::open(tmp.path()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_and_list_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(tmp.path()).unwrap();
        for name in ["a", "b", "c"] {
            let key = format!("https://cdn.example.com/{}.mp4", name);
            store.insert(&key, CacheRecord::new(key.clone(), Arc::from(vec![1u8; 4]), None)).unwrap();
        }
        let keys: Vec<String> = store.list().into_iter().map(|e| e.key).collect();
        assert!(keys[0].ends_with("a.mp4") && keys[2].ends_with("c.mp4"));
        assert_eq!(store.total_bytes(), 12);

        assert_eq!(store.clear().unwrap(), 3);
        assert!(store.is_empty());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
