//! Two-file entry storage
//!
//! Each entry is a header record `<hex>.hdr` and a body blob `<hex>.bdy` in
//! one flat directory. The header file's modification time is the entry's
//! last-access time. Creating the body file with `create_new` is the
//! cross-process write claim: whoever creates it owns the write, and holds an
//! exclusive advisory lock on it until the write is finalized. Any instance
//! can tell a body that is still being written from a complete one by
//! probing that lock.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use fs2::FileExt;
use tracing::{debug, error, warn};

use crate::constants::files;
use crate::errors::{CacheError, CacheResult};

use super::headers::HeaderRecord;
use super::key::CacheKey;

/// Size and recency of one stored entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub key: CacheKey,
    /// Header record size in bytes
    pub header_len: u64,
    /// Body blob size in bytes (0 if the body file is missing)
    pub body_len: u64,
    /// Last access time (header file mtime)
    pub last_access: SystemTime,
}

impl EntryMeta {
    /// Combined size of both files
    pub fn total_len(&self) -> u64 {
        self.header_len + self.body_len
    }
}

/// File-level operations on cache entries
#[derive(Debug, Clone)]
pub struct EntryStore {
    root: PathBuf,
}

impl EntryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache directory if it is missing
    pub fn ensure_root(&self) -> CacheResult<()> {
        if !self.root.is_dir() {
            fs::create_dir_all(&self.root).map_err(|e| {
                error!("Failed to create cache directory: {}", e);
                CacheError::DirectoryNotAccessible {
                    path: self.root.clone(),
                }
            })?;
            debug!("Created cache directory: {}", self.root.display());
        }
        Ok(())
    }

    pub fn header_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{}{}", key.to_hex(), files::HEADER_SUFFIX))
    }

    pub fn body_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}{}", key.to_hex(), files::BODY_SUFFIX))
    }

    /// True iff both the header and the body file exist
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.header_path(key).is_file() && self.body_path(key).is_file()
    }

    /// Read and decode the header record
    pub fn read_headers(&self, key: &CacheKey) -> CacheResult<HeaderRecord> {
        match fs::read(self.header_path(key)) {
            Ok(bytes) => Ok(HeaderRecord::decode(&bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CacheError::NotFound {
                key: key.to_hex(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Write an already-encoded header record
    ///
    /// The record goes to a temporary file first and is renamed into place,
    /// so readers never see a half-written header file.
    pub fn write_headers(&self, key: &CacheKey, encoded: &[u8]) -> CacheResult<()> {
        let final_path = self.header_path(key);
        let temp_path = self
            .root
            .join(format!("{}{}", key.to_hex(), files::HEADER_TEMP_SUFFIX));

        let result = (|| -> io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(encoded)?;
            file.sync_data()?;
            fs::rename(&temp_path, &final_path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Mark the entry as accessed now
    ///
    /// Failures are logged and swallowed; a stale timestamp only affects
    /// eviction order.
    pub fn touch(&self, key: &CacheKey) {
        if let Err(e) = self.touch_at(key, SystemTime::now()) {
            debug!("Failed to update access time for {}: {}", key, e);
        }
    }

    /// Set the entry's last-access time explicitly
    pub fn touch_at(&self, key: &CacheKey, when: SystemTime) -> io::Result<()> {
        let file = OpenOptions::new().write(true).open(self.header_path(key))?;
        file.set_modified(when)
    }

    /// Atomically create an empty body file
    ///
    /// Returns the open, exclusively locked file on success and `None` if
    /// the body file already exists, which means another writer holds the
    /// claim or the entry is already complete. The lock is released when the
    /// returned file is dropped.
    pub fn create_body_placeholder(&self, key: &CacheKey) -> CacheResult<Option<File>> {
        let path = self.body_path(key);
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = FileExt::lock_exclusive(&file) {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(Some(file))
    }

    /// True while some writer, in this or another process, holds the body
    /// file's lock
    pub fn is_being_written(&self, key: &CacheKey) -> bool {
        let Ok(file) = File::open(self.body_path(key)) else {
            return false;
        };
        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => true,
            Err(e) => {
                debug!("Could not probe write lock for {}: {}", key, e);
                false
            }
        }
    }

    /// Open the body blob for reading
    pub fn open_body(&self, key: &CacheKey) -> CacheResult<File> {
        File::open(self.body_path(key)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::NotFound { key: key.to_hex() },
            _ => e.into(),
        })
    }

    /// Current body size, 0 if the body file is missing
    pub fn body_len(&self, key: &CacheKey) -> u64 {
        file_len(&self.body_path(key))
    }

    /// Keep the entry if the body has exactly the expected length
    ///
    /// On mismatch both files are deleted and `CorruptOrIncomplete` is
    /// returned.
    pub fn finalize(&self, key: &CacheKey, expected_len: u64) -> CacheResult<()> {
        let actual = self.body_len(key);
        if actual == expected_len {
            return Ok(());
        }

        self.delete(key)?;
        Err(CacheError::CorruptOrIncomplete {
            expected: expected_len,
            actual,
        })
    }

    /// Remove both files of an entry; missing files are not an error
    pub fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        remove_if_present(&self.header_path(key))?;
        remove_if_present(&self.body_path(key))?;
        Ok(())
    }

    /// Enumerate all entries that have a header file
    pub fn entries(&self) -> CacheResult<Vec<EntryMeta>> {
        let mut entries = Vec::new();

        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        for entry in dir.flatten() {
            let Some(key) = key_with_suffix(&entry.path(), files::HEADER_SUFFIX) else {
                continue;
            };
            // A racing delete can remove the file between listing and stat
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let last_access = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

            entries.push(EntryMeta {
                key,
                header_len: metadata.len(),
                body_len: self.body_len(&key),
                last_access,
            });
        }

        Ok(entries)
    }

    /// Body files with no header file next to them
    pub fn orphan_bodies(&self) -> CacheResult<Vec<CacheKey>> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(dir
            .flatten()
            .filter_map(|entry| key_with_suffix(&entry.path(), files::BODY_SUFFIX))
            .filter(|key| !self.header_path(key).exists())
            .collect())
    }

    /// Remove header temp files older than `min_age`
    ///
    /// Younger files may belong to a header write in progress and are left
    /// alone. Returns the number of files removed.
    pub fn remove_stale_temp_files(&self, min_age: Duration) -> CacheResult<usize> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in dir.flatten() {
            let path = entry.path();
            if key_with_suffix(&path, files::HEADER_TEMP_SUFFIX).is_none() {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if now.duration_since(modified).unwrap_or_default() < min_age {
                continue;
            }
            remove_if_present(&path)?;
            removed += 1;
        }

        if removed > 0 {
            debug!("Removed {} stale header temp files", removed);
        }
        Ok(removed)
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn remove_if_present(path: &Path) -> CacheResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!("Failed to remove cache file {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}

/// Parse `<hex><suffix>` file names back into keys
fn key_with_suffix(path: &Path, suffix: &str) -> Option<CacheKey> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(suffix)?;
    CacheKey::from_hex(stem).ok()
}
