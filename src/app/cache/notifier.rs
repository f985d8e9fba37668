//! Completion notification for in-flight writes
//!
//! Callers register interest in a URI; when the write for that URI finishes
//! every registered callback runs once, in registration order, and the
//! registration is cleared. A finished write fires the same notification
//! whether it was committed or discarded.
//!
//! Callbacks run synchronously on the thread that closed the write handle.
//! Keep them short: the write's finalize path waits for them.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use super::key::CacheKey;

/// Callback invoked with the URI whose write finished
pub type CompletionCallback = Box<dyn FnOnce(&Url) + Send + 'static>;

/// Registry of callbacks awaiting a key's write completion
#[derive(Default)]
pub struct CompletionNotifier {
    listeners: Mutex<HashMap<CacheKey, Vec<CompletionCallback>>>,
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("pending_keys", &self.listeners.lock().len())
            .finish()
    }
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for the next completion of `key`
    pub fn subscribe<F>(&self, key: CacheKey, callback: F)
    where
        F: FnOnce(&Url) + Send + 'static,
    {
        self.listeners
            .lock()
            .entry(key)
            .or_default()
            .push(Box::new(callback));
    }

    /// Receiver resolved on the next completion of `key`
    pub fn wait_for(&self, key: CacheKey) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.subscribe(key, move |_| {
            let _ = tx.send(());
        });
        rx
    }

    /// Invoke and clear every callback registered for `key`
    ///
    /// The list is detached under the lock and run after releasing it, so a
    /// callback may subscribe again without deadlocking. Returns the number
    /// of callbacks run.
    pub fn fire(&self, key: &CacheKey, uri: &Url) -> usize {
        let callbacks = self.listeners.lock().remove(key).unwrap_or_default();
        let count = callbacks.len();
        for callback in callbacks {
            callback(uri);
        }
        if count > 0 {
            debug!("Notified {} listeners of cache completion for {}", count, uri);
        }
        count
    }

    /// Number of callbacks waiting on `key`
    pub fn pending(&self, key: &CacheKey) -> usize {
        self.listeners.lock().get(key).map_or(0, Vec::len)
    }
}
