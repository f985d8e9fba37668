//! Cache configuration types and defaults
//!
//! The budget is configured in kilobytes and converted to bytes once, when
//! the cache is opened. Changing it means opening a new cache instance.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::cache;

use super::sweeper::SweepSchedule;

/// Configuration for the response cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for cache storage (OS-specific if None)
    pub cache_root: Option<PathBuf>,
    /// Maximum total size of all entries in kilobytes
    pub max_size_kb: u64,
    /// Delay before the first eviction sweep
    pub initial_sweep_delay: Duration,
    /// Fixed delay between eviction sweeps
    pub sweep_period: Duration,
    /// Exclude video containers from caching
    pub exclude_media: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: None, // Will use OS-specific cache directory
            max_size_kb: cache::DEFAULT_MAX_SIZE_KB,
            initial_sweep_delay: cache::INITIAL_SWEEP_DELAY,
            sweep_period: cache::SWEEP_PERIOD,
            exclude_media: false,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with custom cache root
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            cache_root: Some(cache_root),
            ..Default::default()
        }
    }

    /// Set the budget in kilobytes
    pub fn with_max_size_kb(mut self, max_size_kb: u64) -> Self {
        self.max_size_kb = max_size_kb;
        self
    }

    /// Set the eviction schedule
    pub fn with_sweep_schedule(mut self, initial_delay: Duration, period: Duration) -> Self {
        self.initial_sweep_delay = initial_delay;
        self.sweep_period = period;
        self
    }

    /// Enable or disable the video exclusion policy
    pub fn with_exclude_media(mut self, enabled: bool) -> Self {
        self.exclude_media = enabled;
        self
    }

    /// Budget in bytes
    pub fn budget_bytes(&self) -> u64 {
        self.max_size_kb.saturating_mul(cache::BYTES_PER_KB)
    }

    pub fn sweep_schedule(&self) -> SweepSchedule {
        SweepSchedule {
            initial_delay: self.initial_sweep_delay,
            period: self.sweep_period,
        }
    }
}
