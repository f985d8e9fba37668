//! Prelude module
//!
//! Re-exports the items most integrations need, so a single
//! `use http_response_cache::prelude::*;` is enough.
//!
//! # Usage
//!
//! ```rust,no_run
//! use http_response_cache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let cache = ResponseCache::open(CacheConfig::default()).await?;
//!     let client = CachingClient::new(Arc::clone(&cache))?;
//!
//!     let body = client.get(&Url::parse("http://example.com/")?).await?;
//!     println!("{} bytes", body.bytes.len());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, CacheError, FetchError, Result};

// Engine and client
pub use crate::app::{
    CacheConfig, CacheKey, CacheStats, CachedResponse, CachingClient, FetchedBody, HeaderRecord,
    ResponseCache, SweepReport, WriteHandle, WriteOutcome,
};

// Collaborator seams
pub use crate::app::cache::{
    DirectoryAccess, ExclusionPolicy, MediaExclusion, NoExclusion, StorageAccess,
};

// Commonly used constants
pub use crate::constants::{DEFAULT_MAX_SIZE_KB, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;
pub use url::Url;
