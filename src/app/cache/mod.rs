//! Disk-backed HTTP response cache
//!
//! Responses are stored per request URI as two files: a line-oriented header
//! record and an opaque body blob. Total size is bounded by a budget that a
//! background sweeper enforces by deleting the least recently accessed
//! entries.
//!
//! # Key Features
//!
//! - **Content-addressed keys**: SHA-256 of the URI names both entry files
//! - **Write claims**: at most one write per key, enforced in-process and, across
//!   instances, by a locked body file
//! - **Length-checked commits**: a body that does not match its declared
//!   length is discarded when the write handle closes
//! - **Background eviction**: a recurring sweep keeps the most recently used
//!   entries that fit the budget
//! - **Completion listeners**: callers can wait for an in-flight write
//!
//! # Module Organization
//!
//! - [`key`] - Cache key derivation
//! - [`headers`] - Header records and their file format
//! - [`store`] - Two-file entry storage
//! - [`reservation`] - In-process write claims
//! - [`writer`] - Write admission and write handles
//! - [`sweeper`] - Background eviction
//! - [`notifier`] - Completion notification
//! - [`policy`] - Cacheability policies and collaborator seams
//! - [`stats`] - Cache statistics
//! - [`manager`] - The [`ResponseCache`] facade
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::io::{Read, Write};
//!
//! use http_response_cache::app::cache::{CacheConfig, HeaderRecord, ResponseCache};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ResponseCache::open(CacheConfig::default()).await?;
//! let uri = Url::parse("http://example.com/data.json")?;
//!
//! if let Some(mut hit) = cache.lookup(&uri) {
//!     let mut body = Vec::new();
//!     hit.body.read_to_end(&mut body)?;
//! } else {
//!     let mut headers = HeaderRecord::new();
//!     headers.append(Some("content-length"), "2");
//!     if let Some(mut handle) = cache.begin_store(&uri, &headers, 2) {
//!         handle.write_all(b"{}")?;
//!         handle.close();
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod headers;
pub mod key;
pub mod manager;
pub mod notifier;
pub mod policy;
pub mod reservation;
pub mod stats;
pub mod store;
pub mod sweeper;
pub mod writer;

// Re-export main public API
pub use config::CacheConfig;
pub use headers::HeaderRecord;
pub use key::CacheKey;
pub use manager::{CachedResponse, ResponseCache};
pub use notifier::{CompletionCallback, CompletionNotifier};
pub use policy::{
    declared_length, DirectoryAccess, ExclusionPolicy, MediaExclusion, NoExclusion, StorageAccess,
};
pub use reservation::{ClaimRegistry, ReservationInfo, WriteState};
pub use stats::CacheStats;
pub use store::{EntryMeta, EntryStore};
pub use sweeper::{EvictionSweeper, SweepReport, SweepSchedule};
pub use writer::{WriteCoordinator, WriteHandle, WriteOutcome};
