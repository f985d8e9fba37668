//! Core application logic
//!
//! This module contains the response cache engine and the HTTP client that
//! reads through it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use http_response_cache::app::{CacheConfig, CachingClient, ResponseCache};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ResponseCache::open(CacheConfig::default()).await?;
//! let client = CachingClient::new(Arc::clone(&cache))?;
//!
//! let url = Url::parse("http://example.com/data.json")?;
//! let first = client.get(&url).await?;
//! let second = client.get(&url).await?;
//! assert!(!first.from_cache);
//! assert!(second.from_cache);
//!
//! cache.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;

// Re-export main public API
pub use cache::{
    CacheConfig, CacheKey, CacheStats, CachedResponse, HeaderRecord, ResponseCache, SweepReport,
    WriteHandle, WriteOutcome,
};
pub use client::{CachingClient, FetchedBody};
