//! Write admission and write handles
//!
//! [`WriteCoordinator::begin_write`] runs the admission checks, claims the
//! key, writes the header record and hands back a [`WriteHandle`]. The
//! network layer streams the body into the handle. Closing the handle, or
//! dropping it, finalizes the entry against its declared length, releases
//! the claim and fires the completion notification, in that order.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::errors::{CacheError, CacheResult};

use super::headers::HeaderRecord;
use super::key::CacheKey;
use super::notifier::CompletionNotifier;
use super::policy;
use super::reservation::{ClaimRegistry, ReservationInfo, WriteState};
use super::store::EntryStore;

/// How a finished write ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Body length matched; the entry is now a cache hit
    Committed,
    /// Body length did not match; both files were removed
    Discarded,
}

impl From<WriteOutcome> for WriteState {
    fn from(outcome: WriteOutcome) -> Self {
        match outcome {
            WriteOutcome::Committed => WriteState::Committed,
            WriteOutcome::Discarded => WriteState::Discarded,
        }
    }
}

/// Admits writes and hands out write handles
#[derive(Debug, Clone)]
pub struct WriteCoordinator {
    store: Arc<EntryStore>,
    claims: Arc<ClaimRegistry>,
    notifier: Arc<CompletionNotifier>,
    budget: u64,
}

impl WriteCoordinator {
    pub fn new(
        store: Arc<EntryStore>,
        claims: Arc<ClaimRegistry>,
        notifier: Arc<CompletionNotifier>,
        budget: u64,
    ) -> Self {
        Self {
            store,
            claims,
            notifier,
            budget,
        }
    }

    /// Budget in bytes this coordinator admits against
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Admit a write for `uri`
    ///
    /// # Errors
    ///
    /// - `NotCacheable` if a `cache-control` directive forbids storing
    /// - `AdmissionRejected` if the entry would exceed the budget, the key
    ///   is already being written, or a body file already exists
    /// - `Io` / `DirectoryNotAccessible` if the entry files cannot be created
    ///
    /// No file is created when admission fails.
    pub fn begin_write(
        &self,
        uri: &Url,
        headers: &HeaderRecord,
        declared_len: u64,
    ) -> CacheResult<WriteHandle> {
        if let Some(directive) = policy::forbidding_directive(headers) {
            return Err(CacheError::NotCacheable {
                reason: format!("cache-control: {}", directive),
            });
        }

        let encoded = headers.encode();
        let entry_size = declared_len.saturating_add(encoded.len() as u64);
        if entry_size > self.budget {
            return Err(CacheError::AdmissionRejected {
                reason: format!(
                    "entry of {} bytes exceeds budget of {} bytes",
                    entry_size, self.budget
                ),
            });
        }

        let key = CacheKey::for_url(uri);
        if !self
            .claims
            .try_claim(key, ReservationInfo::new(uri.clone(), declared_len))
        {
            return Err(CacheError::AdmissionRejected {
                reason: format!("write already in progress for {}", uri),
            });
        }

        match self.create_entry(&key, &encoded) {
            Ok(file) => {
                debug!("Claimed cache entry {} for {}", key, uri);
                Ok(WriteHandle {
                    key,
                    uri: uri.clone(),
                    declared_len,
                    written: 0,
                    file: Some(BufWriter::new(file)),
                    store: Arc::clone(&self.store),
                    claims: Arc::clone(&self.claims),
                    notifier: Arc::clone(&self.notifier),
                })
            }
            Err(e) => {
                self.claims.release(&key);
                Err(e)
            }
        }
    }

    fn create_entry(&self, key: &CacheKey, encoded: &[u8]) -> CacheResult<File> {
        self.store.ensure_root()?;

        let Some(file) = self.store.create_body_placeholder(key)? else {
            return Err(CacheError::AdmissionRejected {
                reason: format!("body file for {} already exists", key),
            });
        };

        if let Err(e) = self.store.write_headers(key, encoded) {
            drop(file);
            let _ = self.store.delete(key);
            return Err(e);
        }

        Ok(file)
    }
}

/// Exclusive write access to one claimed entry
///
/// Finalization happens exactly once, either through [`WriteHandle::close`]
/// or when the handle is dropped.
#[derive(Debug)]
pub struct WriteHandle {
    key: CacheKey,
    uri: Url,
    declared_len: u64,
    written: u64,
    file: Option<BufWriter<File>>,
    store: Arc<EntryStore>,
    claims: Arc<ClaimRegistry>,
    notifier: Arc<CompletionNotifier>,
}

impl WriteHandle {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn declared_len(&self) -> u64 {
        self.declared_len
    }

    /// Bytes accepted so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Finalize the entry and notify listeners
    pub fn close(mut self) -> WriteOutcome {
        self.finish()
    }

    fn finish(&mut self) -> WriteOutcome {
        // The body lock is held until finalize has run
        let mut file = self.file.take();
        if let Some(file) = file.as_mut() {
            if let Err(e) = file.flush() {
                warn!("Failed to flush cache body for {}: {}", self.uri, e);
            }
        }

        let outcome = match self.store.finalize(&self.key, self.declared_len) {
            Ok(()) => {
                debug!("Cached {} ({} bytes)", self.uri, self.declared_len);
                WriteOutcome::Committed
            }
            Err(CacheError::CorruptOrIncomplete { expected, actual }) => {
                warn!(
                    "Failed to add {} to the cache: expected {} bytes, got {}",
                    self.uri, expected, actual
                );
                WriteOutcome::Discarded
            }
            Err(e) => {
                warn!("Failed to finalize cache entry for {}: {}", self.uri, e);
                let _ = self.store.delete(&self.key);
                WriteOutcome::Discarded
            }
        };
        drop(file);

        self.claims.release(&self.key);
        debug!("Write for {} ended {:?}", self.key, WriteState::from(outcome));
        self.notifier.fire(&self.key, &self.uri);
        outcome
    }
}

impl Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "write handle closed"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        if self.file.is_some() {
            self.finish();
        }
    }
}
