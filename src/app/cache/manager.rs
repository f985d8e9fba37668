//! Response cache facade
//!
//! [`ResponseCache`] owns every piece of cache state: the entry store, the
//! claim registry, the completion listeners and the sweeper task. Nothing is
//! process-global; tests build isolated instances.
//!
//! All facade operations are best-effort. Errors are logged and turned into
//! a miss or a declined store, never surfaced to the network path.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{cache, files, headers};
use crate::errors::{CacheError, CacheResult};

use super::config::CacheConfig;
use super::headers::HeaderRecord;
use super::key::CacheKey;
use super::notifier::CompletionNotifier;
use super::policy::{self, DirectoryAccess, ExclusionPolicy, MediaExclusion, StorageAccess};
use super::reservation::ClaimRegistry;
use super::stats::CacheStats;
use super::store::EntryStore;
use super::sweeper::{EvictionSweeper, SweepReport};
use super::writer::{WriteCoordinator, WriteHandle};

/// A cache hit: stored headers and the raw stored body
#[derive(Debug)]
pub struct CachedResponse {
    pub headers: HeaderRecord,
    pub body: File,
}

/// Disk-backed HTTP response cache
pub struct ResponseCache {
    config: CacheConfig,
    store: Arc<EntryStore>,
    claims: Arc<ClaimRegistry>,
    notifier: Arc<CompletionNotifier>,
    writer: WriteCoordinator,
    sweeper: EvictionSweeper,
    exclusion: Arc<dyn ExclusionPolicy>,
    access: Arc<dyn StorageAccess>,
    shutdown_tx: broadcast::Sender<()>,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("cache_root", &self.store.root())
            .field("budget", &self.writer.budget())
            .field("in_flight", &self.claims.len())
            .finish()
    }
}

impl ResponseCache {
    /// Open a cache, remove entries left by interrupted writes and start its
    /// eviction sweeper
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache directory cannot be created or
    /// scanned
    pub async fn open(config: CacheConfig) -> CacheResult<Arc<Self>> {
        let cache = tokio::task::spawn_blocking(move || {
            let cache = Self::new(config)?;
            let recovered = cache.recover()?;
            if recovered > 0 {
                info!("Removed {} incomplete cache entries", recovered);
            }
            Ok::<_, CacheError>(cache)
        })
        .await
        .map_err(|e| CacheError::Io(std::io::Error::other(e)))??;
        let cache = Arc::new(cache);
        cache.start_sweeper();
        Ok(cache)
    }

    /// Create a cache with the default policies
    ///
    /// Neither recovery nor the sweeper runs, so entries being written by
    /// another instance over the same directory are left alone.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let exclusion = Arc::new(MediaExclusion::new(config.exclude_media));
        Self::with_policies(config, exclusion, Arc::new(DirectoryAccess))
    }

    /// Create a cache with caller-supplied collaborator policies
    pub fn with_policies(
        config: CacheConfig,
        exclusion: Arc<dyn ExclusionPolicy>,
        access: Arc<dyn StorageAccess>,
    ) -> CacheResult<Self> {
        let cache_root = match &config.cache_root {
            Some(path) => path.clone(),
            None => Self::get_default_cache_dir()?,
        };

        let budget = config.budget_bytes();
        let store = Arc::new(EntryStore::new(cache_root));
        store.ensure_root()?;

        let claims = Arc::new(ClaimRegistry::new());
        let notifier = Arc::new(CompletionNotifier::new());
        let writer = WriteCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&claims),
            Arc::clone(&notifier),
            budget,
        );
        let sweeper = EvictionSweeper::new(Arc::clone(&store), Arc::clone(&claims), budget);
        let (shutdown_tx, _) = broadcast::channel(1);

        debug!("max cache size is: {} bytes", budget);
        info!(
            "Initialized response cache with root: {}",
            store.root().display()
        );

        Ok(Self {
            config,
            store,
            claims,
            notifier,
            writer,
            sweeper,
            exclusion,
            access,
            shutdown_tx,
            sweep_task: Mutex::new(None),
        })
    }

    /// Default cache directory for the current OS
    fn get_default_cache_dir() -> CacheResult<PathBuf> {
        Ok(dirs::cache_dir()
            .ok_or_else(|| CacheError::DirectoryNotAccessible {
                path: PathBuf::from("system cache directory"),
            })?
            .join(files::APP_DIR_NAME))
    }

    pub fn cache_root(&self) -> &Path {
        self.store.root()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Budget in bytes, fixed for the life of this instance
    pub fn budget(&self) -> u64 {
        self.writer.budget()
    }

    /// Start the recurring eviction task if it is not running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sweeper(&self) {
        let mut task = self.sweep_task.lock();
        if task.is_some() {
            return;
        }
        let schedule = self.config.sweep_schedule();
        *task = Some(
            self.sweeper
                .clone()
                .spawn(schedule, self.shutdown_tx.subscribe()),
        );
        debug!(
            "Eviction sweeper scheduled: first in {:?}, then every {:?}",
            schedule.initial_delay, schedule.period
        );
    }

    /// Stop the eviction task and wait for it to exit
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        let task = self.sweep_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Eviction sweeper ended abnormally: {}", e);
            }
        }
    }

    /// True when the cache must act as if it did not exist for `uri`
    fn bypassed(&self, uri: &Url) -> bool {
        if !self.access.is_available(self.store.root()) {
            debug!("Cache storage unavailable, bypassing cache for {}", uri);
            return true;
        }
        if self.exclusion.is_excluded(uri) {
            debug!("Content type excluded from cache: {}", uri);
            return true;
        }
        false
    }

    /// Key of a committed, readable entry
    fn committed_key(&self, uri: &Url) -> Option<CacheKey> {
        if self.bypassed(uri) {
            return None;
        }
        let key = CacheKey::for_url(uri);
        if self.in_flight(&key) || !self.store.exists(&key) {
            return None;
        }
        Some(key)
    }

    /// Claimed here, or body locked by a writer in any instance
    fn in_flight(&self, key: &CacheKey) -> bool {
        self.claims.is_claimed(key) || self.store.is_being_written(key)
    }

    /// Serve a stored response
    ///
    /// A hit refreshes the entry's access time. Returns `None` on a miss, for
    /// an entry still being written, or on any storage error.
    pub fn lookup(&self, uri: &Url) -> Option<CachedResponse> {
        let key = self.committed_key(uri)?;

        let headers = match self.store.read_headers(&key) {
            Ok(headers) => headers,
            Err(e) => {
                debug!("Cache miss for {}: {}", uri, e);
                return None;
            }
        };

        self.store.touch(&key);

        match self.store.open_body(&key) {
            Ok(body) => {
                debug!("Cache hit for {}", uri);
                Some(CachedResponse { headers, body })
            }
            Err(e) => {
                debug!("Cache miss for {}: {}", uri, e);
                None
            }
        }
    }

    /// Start storing a response
    ///
    /// Returns `None` when the store is declined; the caller then proceeds
    /// without caching.
    pub fn begin_store(
        &self,
        uri: &Url,
        headers: &HeaderRecord,
        declared_len: u64,
    ) -> Option<WriteHandle> {
        if self.bypassed(uri) {
            return None;
        }

        match self.writer.begin_write(uri, headers, declared_len) {
            Ok(handle) => Some(handle),
            Err(e @ (CacheError::NotCacheable { .. } | CacheError::AdmissionRejected { .. })) => {
                debug!("Not caching {}: {}", uri, e);
                None
            }
            Err(e) => {
                warn!("Failed to start cache write for {}: {}", uri, e);
                None
            }
        }
    }

    /// Start storing a response, taking the declared length from its
    /// `content-length` header
    pub fn begin_store_response(&self, uri: &Url, headers: &HeaderRecord) -> Option<WriteHandle> {
        self.begin_store(uri, headers, policy::declared_length(headers))
    }

    /// Whether a committed entry exists, without reading it
    pub fn peek(&self, uri: &Url) -> bool {
        self.committed_key(uri).is_some()
    }

    /// Open the stored body, decompressed if it was stored gzip-encoded
    ///
    /// The encoding is decided once, from the stored `content-encoding`
    /// header. An unreadable header record means the body is returned raw.
    pub fn open_stream(&self, uri: &Url) -> Option<Box<dyn Read + Send>> {
        let key = self.committed_key(uri)?;

        let is_gzip = match self.store.read_headers(&key) {
            Ok(record) => record
                .get(headers::CONTENT_ENCODING)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(headers::GZIP)),
            Err(e) => {
                debug!("Could not read cached headers for {}: {}", uri, e);
                false
            }
        };

        let body = match self.store.open_body(&key) {
            Ok(body) => body,
            Err(e) => {
                debug!("Could not open cached body for {}: {}", uri, e);
                return None;
            }
        };

        if is_gzip {
            Some(Box::new(GzDecoder::new(BufReader::new(body))))
        } else {
            Some(Box::new(body))
        }
    }

    /// Call `callback` once when the current or next write for `uri` ends
    pub fn add_complete_listener<F>(&self, uri: &Url, callback: F)
    where
        F: FnOnce(&Url) + Send + 'static,
    {
        self.notifier.subscribe(CacheKey::for_url(uri), callback);
    }

    /// Resolve when the current or next write for `uri` ends
    pub fn wait_for(&self, uri: &Url) -> oneshot::Receiver<()> {
        self.notifier.wait_for(CacheKey::for_url(uri))
    }

    /// Run one eviction sweep now, on the calling thread
    pub fn sweep_now(&self) -> CacheResult<SweepReport> {
        self.sweeper.sweep()
    }

    /// Current cache statistics
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let entries = self.store.entries()?;
        Ok(CacheStats::from_entries(
            self.store.root().to_path_buf(),
            &entries,
            self.budget(),
            self.claims.all().into_iter().map(|(_, info)| info).collect(),
        ))
    }

    /// Delete every entry that is not being written; returns the count
    pub fn clear(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for entry in self.store.entries()? {
            if self.in_flight(&entry.key) {
                continue;
            }
            self.store.delete(&entry.key)?;
            removed += 1;
        }
        for key in self.store.orphan_bodies()? {
            if !self.in_flight(&key) {
                self.store.delete(&key)?;
            }
        }
        self.store.remove_stale_temp_files(cache::STALE_TEMP_AGE)?;
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    /// Remove entries left behind by writes that never finished
    ///
    /// Body files without a header are deleted. Entries whose header record
    /// carries a `content-length` that disagrees with the body size are
    /// deleted too. Bodies still locked by a writer, in this or another
    /// instance, are skipped. Old header temp files are removed.
    pub fn recover(&self) -> CacheResult<usize> {
        let mut removed = 0;

        for key in self.store.orphan_bodies()? {
            if self.in_flight(&key) {
                continue;
            }
            self.store.delete(&key)?;
            removed += 1;
        }

        for entry in self.store.entries()? {
            if self.in_flight(&entry.key) {
                continue;
            }
            let Ok(record) = self.store.read_headers(&entry.key) else {
                continue;
            };
            if record.get(headers::CONTENT_LENGTH).is_none() {
                continue;
            }
            let declared = policy::declared_length(&record);
            if declared != entry.body_len || !self.store.body_path(&entry.key).exists() {
                warn!(
                    "Removing incomplete cache entry {}: expected {} bytes, found {}",
                    entry.key, declared, entry.body_len
                );
                self.store.delete(&entry.key)?;
                removed += 1;
            }
        }

        self.store.remove_stale_temp_files(cache::STALE_TEMP_AGE)?;
        Ok(removed)
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
