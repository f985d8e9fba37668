//! Cacheability policies and collaborator seams
//!
//! Three checks decide whether the cache takes part in a request at all:
//! the storage availability check, the per-content-type exclusion predicate,
//! and, for stores, the `cache-control` directives of the response.

use std::path::Path;

use url::Url;

use crate::constants::{exclusion, headers};

use super::headers::HeaderRecord;

/// Decides whether a URI's content type must bypass the cache
pub trait ExclusionPolicy: Send + Sync {
    fn is_excluded(&self, uri: &Url) -> bool;
}

/// Decides whether the cache storage may be used right now
pub trait StorageAccess: Send + Sync {
    fn is_available(&self, cache_root: &Path) -> bool;
}

/// Never excludes anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusion;

impl ExclusionPolicy for NoExclusion {
    fn is_excluded(&self, _uri: &Url) -> bool {
        false
    }
}

/// Excludes video containers when the platform condition holds
///
/// `enabled` carries the platform condition; the extension list is fixed.
#[derive(Debug, Clone, Copy)]
pub struct MediaExclusion {
    pub enabled: bool,
}

impl MediaExclusion {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl ExclusionPolicy for MediaExclusion {
    fn is_excluded(&self, uri: &Url) -> bool {
        if !self.enabled {
            return false;
        }
        match file_extension(uri) {
            Some(ext) => exclusion::VIDEO_EXTENSIONS.contains(&ext.as_str()),
            None => false,
        }
    }
}

/// Storage is usable unless the root is a file or read-only
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryAccess;

impl StorageAccess for DirectoryAccess {
    fn is_available(&self, cache_root: &Path) -> bool {
        match std::fs::metadata(cache_root) {
            Ok(metadata) => metadata.is_dir() && !metadata.permissions().readonly(),
            // Missing directories are recreated on store
            Err(_) => true,
        }
    }
}

/// Lower-cased extension of the last path segment
pub fn file_extension(uri: &Url) -> Option<String> {
    let segment = uri.path_segments()?.last()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// The `cache-control` directive that forbids storing, if any
///
/// Every `cache-control` value is checked by case-insensitive substring
/// match.
pub fn forbidding_directive(record: &HeaderRecord) -> Option<&'static str> {
    let values = record.get_all(headers::CACHE_CONTROL)?;
    values.iter().find_map(|value| {
        let value = value.to_ascii_lowercase();
        headers::NOT_CACHEABLE_DIRECTIVES
            .iter()
            .copied()
            .find(|directive| value.contains(directive))
    })
}

/// Declared body length from the last `content-length` value, 0 if absent
pub fn declared_length(record: &HeaderRecord) -> u64 {
    record
        .get(headers::CONTENT_LENGTH)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
