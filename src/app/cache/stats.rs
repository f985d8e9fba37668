//! Cache statistics
//!
//! A point-in-time summary built from a directory scan plus the in-process
//! claim registry.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::reservation::ReservationInfo;
use super::store::EntryMeta;

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cache root directory
    pub cache_root: PathBuf,
    /// Number of entries with a header file
    pub entry_count: usize,
    /// Total header and body bytes on disk
    pub total_bytes: u64,
    /// Configured budget in bytes
    pub budget_bytes: u64,
    /// Writes currently holding a claim
    pub in_flight_writes: usize,
    /// Claimed writes, oldest first
    pub in_flight: Vec<ReservationInfo>,
    /// Least recent access time
    pub oldest_access: Option<DateTime<Utc>>,
    /// Most recent access time
    pub newest_access: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Summarize scanned entries
    pub fn from_entries(
        cache_root: PathBuf,
        entries: &[EntryMeta],
        budget_bytes: u64,
        in_flight: Vec<ReservationInfo>,
    ) -> Self {
        let access_times = entries.iter().map(|e| DateTime::<Utc>::from(e.last_access));

        Self {
            cache_root,
            entry_count: entries.len(),
            total_bytes: entries.iter().map(EntryMeta::total_len).sum(),
            budget_bytes,
            in_flight_writes: in_flight.len(),
            in_flight,
            oldest_access: access_times.clone().min(),
            newest_access: access_times.max(),
        }
    }

    /// Usage as a percentage of the budget
    pub fn usage_percentage(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        self.total_bytes as f64 / self.budget_bytes as f64 * 100.0
    }

    /// True when the next sweep will evict something
    pub fn is_over_budget(&self) -> bool {
        self.total_bytes > self.budget_bytes
    }

    /// Format total size in human-readable format
    pub fn format_total_size(&self) -> String {
        format_bytes(self.total_bytes)
    }

    /// Format budget in human-readable format
    pub fn format_budget(&self) -> String {
        format_bytes(self.budget_bytes)
    }
}

/// Format bytes into human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
