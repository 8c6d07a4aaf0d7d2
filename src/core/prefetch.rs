//! Prefetch & cache pipeline
//!
//! Turns a resource identity into something the media element can play:
//!
//! 1. Cache lookup (byte cache on, object URLs usable). A lookup error is
//!    logged and treated as a miss.
//! 2. On miss: read the local file, decode an inline `data:` URL, or fetch
//!    over the network. A fetch failure is fatal and returned as
//!    `PlaybackError::Network`.
//! 3. Text-encode the bytes and run the metadata decoder over that form.
//! 4. Fire-and-forget cache insert on the worker pool.
//! 5. Register a local object reference, or hand back the identifier
//!    unchanged when the platform cannot play object URLs.
//!
//! The ticket is re-checked between steps; a stale ticket abandons the run
//! before anything else is created. Concurrent runs for the same identity
//! are not deduplicated (cache writes are last-write-wins).

use crossbeam_channel::Sender;
use log::{debug, trace, warn};
use std::sync::Arc;

use crate::config::ResourceSource;
use crate::core::cache_store::{CacheRecord, CacheStore};
use crate::core::fetcher::{self, ResourceFetcher, VIDEO_MIME};
use crate::core::metadata::{MetadataDecoder, VideoMetadata};
use crate::core::object_url::{LocalObjectReference, MediaSource, ObjectUrlRegistry};
use crate::core::workers::{EpochTicket, WorkerPool};
use crate::error::PlaybackError;

/// Inputs of one prefetch run, captured by value at dispatch
#[derive(Debug, Clone)]
pub struct PrefetchRequest {
    pub source: ResourceSource,
    pub use_byte_cache: bool,
    pub use_metadata: bool,
    /// Platform cannot play local object URLs; stream the identifier instead
    pub avoid_object_url: bool,
}

impl PrefetchRequest {
    pub fn identity(&self) -> &str {
        self.source.identity()
    }

    fn cache_lookup_allowed(&self) -> bool {
        self.use_byte_cache && !self.avoid_object_url
    }
}

/// Playable result of a prefetch run
#[derive(Debug)]
pub struct Prefetched {
    pub source: MediaSource,
    /// Owned object reference backing `source`, if one was created
    pub reference: Option<LocalObjectReference>,
    pub metadata: Option<VideoMetadata>,
    pub from_cache: bool,
}

/// Result message posted back to the owning session
#[derive(Debug)]
pub struct PrefetchOutcome {
    /// Epoch the run was started under
    pub epoch: u64,
    /// Ok(None): abandoned because the session moved on
    pub result: Result<Option<Prefetched>, PlaybackError>,
}

/// Prefetch pipeline bound to its collaborators
#[derive(Clone)]
pub struct Prefetcher {
    fetcher: Arc<dyn ResourceFetcher>,
    cache: Arc<dyn CacheStore>,
    decoder: Arc<dyn MetadataDecoder>,
    objects: ObjectUrlRegistry,
    pool: Arc<dyn WorkerPool>,
}

impl std::fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prefetcher")
            .field("cache_enabled", &self.cache.is_enabled())
            .field("objects", &self.objects)
            .finish()
    }
}

impl Prefetcher {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        cache: Arc<dyn CacheStore>,
        decoder: Arc<dyn MetadataDecoder>,
        objects: ObjectUrlRegistry,
        pool: Arc<dyn WorkerPool>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            decoder,
            objects,
            pool,
        }
    }

    pub fn objects(&self) -> &ObjectUrlRegistry {
        &self.objects
    }

    /// Run the pipeline on the worker pool and post the outcome to `tx`
    pub fn spawn(&self, request: PrefetchRequest, ticket: EpochTicket, tx: Sender<PrefetchOutcome>) {
        let this = self.clone();
        self.pool.execute(Box::new(move || {
            let epoch = ticket.value();
            let result = this.prefetch(&request, &ticket);
            if let Err(e) = tx.send(PrefetchOutcome { epoch, result }) {
                // Receiver gone: the session was dropped, release what we made
                if let Ok(Some(prefetched)) = e.into_inner().result
                    && let Some(reference) = prefetched.reference
                {
                    this.objects.revoke(reference);
                }
            }
        }));
    }

    /// Run the pipeline on the calling thread
    pub fn prefetch(
        &self,
        request: &PrefetchRequest,
        ticket: &EpochTicket,
    ) -> Result<Option<Prefetched>, PlaybackError> {
        let identity = request.identity();

        // 1. cache
        if request.cache_lookup_allowed() {
            match self.cache.find(identity) {
                Ok(Some(record)) => {
                    debug!("Prefetch cache hit: {} ({} bytes)", identity, record.payload.len());
                    if !ticket.is_current() {
                        return Ok(None);
                    }
                    let reference = self.objects.create(record.payload, VIDEO_MIME);
                    return Ok(Some(Prefetched {
                        source: MediaSource::ObjectUrl(reference.url().to_string()),
                        reference: Some(reference),
                        metadata: record.metadata,
                        from_cache: true,
                    }));
                }
                Ok(None) => trace!("Prefetch cache miss: {}", identity),
                Err(e) => warn!("Lookup for {} failed, fetching: {}", identity, PlaybackError::from(e)),
            }
        }
        if !ticket.is_current() {
            return Ok(None);
        }

        // 2. bytes
        let payload: Arc<[u8]> = match &request.source {
            ResourceSource::File(file) => fetcher::read_local_file(file)?,
            ResourceSource::Url(url) if url.starts_with("data:") => fetcher::decode_data_url(url)
                .map(Arc::from)
                .ok_or_else(|| PlaybackError::transport("data:", "malformed data URL"))?,
            ResourceSource::Url(url) => Arc::from(self.fetcher.fetch(url)?),
        };
        debug!("Prefetch loaded {} ({} bytes)", identity, payload.len());
        if !ticket.is_current() {
            return Ok(None);
        }

        // 3. metadata from the text-encoded form
        let metadata = if request.use_metadata {
            let data_url = fetcher::to_data_url(&payload, VIDEO_MIME);
            let decoded = self.decoder.decode(&data_url);
            trace!("Metadata for {}: {}", identity, if decoded.is_some() { "found" } else { "none" });
            decoded
        } else {
            None
        };

        // 5a. workaround: identifier returned unchanged, nothing created or stored
        if request.avoid_object_url {
            debug!("Object URLs unavailable, streaming {} directly", identity);
            return Ok(Some(Prefetched {
                source: MediaSource::Direct(identity.to_string()),
                reference: None,
                metadata,
                from_cache: false,
            }));
        }

        // 4. cache insert
        if request.use_byte_cache {
            let cache = Arc::clone(&self.cache);
            let key = identity.to_string();
            let record = CacheRecord::new(key.clone(), Arc::clone(&payload), metadata.clone());
            self.pool.execute(Box::new(move || {
                if let Err(e) = cache.insert(&key, record) {
                    warn!("Insert for {} failed: {}", key, PlaybackError::from(e));
                }
            }));
        }
        if !ticket.is_current() {
            return Ok(None);
        }

        // 5b. local object
        let reference = self.objects.create(payload, VIDEO_MIME);
        Ok(Some(Prefetched {
            source: MediaSource::ObjectUrl(reference.url().to_string()),
            reference: Some(reference),
            metadata,
            from_cache: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalFile;
    use crate::core::cache_store::{CacheError, MemoryCacheStore};
    use crate::core::workers::{Epoch, InlinePool};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "https://cdn.example.com/gift.mp4";

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        status: Option<u16>,
    }

    impl ResourceFetcher for CountingFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, PlaybackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.status {
                Some(code) => Err(PlaybackError::http_status(url, code)),
                None => Ok(b"mp4-bytes".to_vec()),
            }
        }
    }

    /// Reports audio for any non-empty data URL
    struct AudioDecoder {
        seen: Mutex<Vec<String>>,
    }

    impl MetadataDecoder for AudioDecoder {
        fn decode(&self, data_url: &str) -> Option<VideoMetadata> {
            self.seen.lock().unwrap().push(data_url.to_string());
            Some(VideoMetadata { has_audio: true, ..Default::default() })
        }
    }

    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn find(&self, _key: &str) -> Result<Option<CacheRecord>, CacheError> {
            Err(CacheError::Io("disk gone".into()))
        }
        fn insert(&self, _key: &str, _record: CacheRecord) -> Result<(), CacheError> {
            Err(CacheError::Io("disk gone".into()))
        }
        fn set_enabled(&self, _enabled: bool) {}
        fn is_enabled(&self) -> bool {
            true
        }
    }

    struct Fixture {
        fetcher: Arc<CountingFetcher>,
        cache: Arc<MemoryCacheStore>,
        decoder: Arc<AudioDecoder>,
        prefetcher: Prefetcher,
    }

    fn fixture(status: Option<u16>) -> Fixture {
        let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0), status });
        let cache = Arc::new(MemoryCacheStore::new(8, 1 << 20));
        let decoder = Arc::new(AudioDecoder { seen: Mutex::new(Vec::new()) });
        let prefetcher = Prefetcher::new(
            fetcher.clone(),
            cache.clone(),
            decoder.clone(),
            ObjectUrlRegistry::new(),
            Arc::new(InlinePool),
        );
        Fixture { fetcher, cache, decoder, prefetcher }
    }

    fn request(source: ResourceSource) -> PrefetchRequest {
        PrefetchRequest {
            source,
            use_byte_cache: true,
            use_metadata: true,
            avoid_object_url: false,
        }
    }

    #[test]
    fn test_miss_fetches_decodes_and_stores() {
        let fx = fixture(None);
        let epoch = Epoch::new();
        let out = fx
            .prefetcher
            .prefetch(&request(ResourceSource::Url(URL.into())), &epoch.ticket())
            .unwrap()
            .unwrap();

        assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(!out.from_cache);
        assert!(matches!(out.source, MediaSource::ObjectUrl(_)));
        assert!(out.metadata.as_ref().unwrap().has_audio);
        assert!(fx.decoder.seen.lock().unwrap()[0].starts_with("data:video/mp4;base64,"));

        let stored = fx.cache.find(URL).unwrap().unwrap();
        assert_eq!(&*stored.payload, b"mp4-bytes");
        assert!(stored.metadata.unwrap().has_audio);

        let reference = out.reference.unwrap();
        assert_eq!(fx.prefetcher.objects().resolve(reference.url()).unwrap().len(), 9);
    }

    #[test]
    fn test_cache_hit_skips_network() {
        let fx = fixture(None);
        let meta = VideoMetadata { frames: Some(30), ..Default::default() };
        fx.cache
            .insert(URL, CacheRecord::new(URL, Arc::from(b"cached".to_vec()), Some(meta)))
            .unwrap();

        let out = fx
            .prefetcher
            .prefetch(&request(ResourceSource::Url(URL.into())), &Epoch::new().ticket())
            .unwrap()
            .unwrap();
        assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(out.from_cache);
        assert_eq!(out.metadata.unwrap().frames, Some(30));
        assert!(fx.decoder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_http_404_is_network_error() {
        let fx = fixture(Some(404));
        let err = fx
            .prefetcher
            .prefetch(&request(ResourceSource::Url(URL.into())), &Epoch::new().ticket())
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Network { status: Some(404), .. }));
        assert_eq!(fx.prefetcher.objects().live_count(), 0);
        assert!(fx.cache.is_empty());
    }

    #[test]
    fn test_lookup_error_falls_through_to_fetch() {
        let fetcher = Arc::new(CountingFetcher::default());
        let prefetcher = Prefetcher::new(
            fetcher.clone(),
            Arc::new(BrokenStore),
            Arc::new(crate::core::metadata::NullDecoder),
            ObjectUrlRegistry::new(),
            Arc::new(InlinePool),
        );
        let out = prefetcher
            .prefetch(&request(ResourceSource::Url(URL.into())), &Epoch::new().ticket())
            .unwrap()
            .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(out.reference.is_some());
    }

    #[test]
    fn test_object_url_workaround_returns_identifier() {
        let fx = fixture(None);
        fx.cache
            .insert(URL, CacheRecord::new(URL, Arc::from(b"cached".to_vec()), None))
            .unwrap();
        let mut req = request(ResourceSource::Url(URL.into()));
        req.avoid_object_url = true;

        let out = fx.prefetcher.prefetch(&req, &Epoch::new().ticket()).unwrap().unwrap();
        // cache bypassed, bytes still fetched for metadata
        assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.source, MediaSource::Direct(URL.to_string()));
        assert!(out.reference.is_none());
        assert!(out.metadata.is_some());
        assert_eq!(fx.prefetcher.objects().live_count(), 0);
    }

    #[test]
    fn test_local_file_is_read_not_fetched() {
        let fx = fixture(None);
        let mut req = request(ResourceSource::File(LocalFile::from_bytes("gift.mp4", vec![9u8; 4])));
        req.use_byte_cache = false;

        let out = fx.prefetcher.prefetch(&req, &Epoch::new().ticket()).unwrap().unwrap();
        assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(fx.cache.is_empty());
        assert_eq!(out.reference.unwrap().len(), 4);
    }

    #[test]
    fn test_inline_data_url_is_decoded_not_fetched() {
        let fx = fixture(None);
        let data_url = fetcher::to_data_url(b"inline", VIDEO_MIME);
        let out = fx
            .prefetcher
            .prefetch(&request(ResourceSource::Url(data_url)), &Epoch::new().ticket())
            .unwrap()
            .unwrap();
        assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(out.reference.unwrap().len(), 6);

        let broken = request(ResourceSource::Url("data:video/mp4;base64,***".into()));
        match fx.prefetcher.prefetch(&broken, &Epoch::new().ticket()) {
            Err(e) => assert!(e.is_fatal()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stale_ticket_abandons_run() {
        let fx = fixture(None);
        let epoch = Epoch::new();
        let ticket = epoch.ticket();
        epoch.advance();

        let out = fx
            .prefetcher
            .prefetch(&request(ResourceSource::Url(URL.into())), &ticket)
            .unwrap();
        assert!(out.is_none());
        assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.prefetcher.objects().live_count(), 0);
    }

    #[test]
    fn test_spawn_posts_outcome() {
        let fx = fixture(None);
        let epoch = Epoch::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        fx.prefetcher
            .spawn(request(ResourceSource::Url(URL.into())), epoch.ticket(), tx);

        let outcome = rx.try_recv().unwrap();
        assert_eq!(outcome.epoch, 0);
        assert!(outcome.result.unwrap().is_some());
    }
}
