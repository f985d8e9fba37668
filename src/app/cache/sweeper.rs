//! Background size-bounded eviction
//!
//! A sweep ranks entries by last access, newest first, and walks the ranking
//! adding up header and body sizes. Once the running total passes the
//! budget, that entry and every older one is deleted. Entries with a write
//! in progress, claimed here or body-locked by another instance, are left
//! alone and do not count toward the total.
//!
//! The sweeper runs as a tokio task: first after an initial delay, then with
//! a fixed delay between the end of one sweep and the start of the next.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::CacheResult;

use super::reservation::ClaimRegistry;
use super::store::{EntryMeta, EntryStore};

/// When sweeps run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    pub initial_delay: Duration,
    pub period: Duration,
}

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries considered
    pub scanned: usize,
    /// Entries deleted
    pub evicted: usize,
    /// Bytes kept after the sweep
    pub retained_bytes: u64,
    /// Bytes released by the sweep
    pub freed_bytes: u64,
    /// Entries skipped because a write was in progress
    pub in_flight: usize,
}

/// Deletes least recently accessed entries beyond the budget
#[derive(Debug, Clone)]
pub struct EvictionSweeper {
    store: Arc<EntryStore>,
    claims: Arc<ClaimRegistry>,
    budget: u64,
}

impl EvictionSweeper {
    pub fn new(store: Arc<EntryStore>, claims: Arc<ClaimRegistry>, budget: u64) -> Self {
        Self {
            store,
            claims,
            budget,
        }
    }

    /// Run one sweep on the current thread
    pub fn sweep(&self) -> CacheResult<SweepReport> {
        let mut entries = self.store.entries()?;
        let mut report = SweepReport {
            scanned: entries.len(),
            ..Default::default()
        };

        rank_by_recency(&mut entries);

        let mut running_total = 0u64;
        for entry in entries {
            if self.claims.is_claimed(&entry.key) || self.store.is_being_written(&entry.key) {
                report.in_flight += 1;
                continue;
            }

            running_total = running_total.saturating_add(entry.total_len());
            if running_total <= self.budget {
                report.retained_bytes += entry.total_len();
                continue;
            }

            // Deletion is idempotent; a racing delete is not an error
            match self.store.delete(&entry.key) {
                Ok(()) => {
                    report.evicted += 1;
                    report.freed_bytes += entry.total_len();
                }
                Err(e) => debug!("Could not evict {}: {}", entry.key, e),
            }
        }

        if report.evicted > 0 {
            info!(
                "Evicted {} cache entries ({} bytes freed, {} bytes retained)",
                report.evicted, report.freed_bytes, report.retained_bytes
            );
        }

        Ok(report)
    }

    /// Start the recurring sweep task
    pub fn spawn(
        self,
        schedule: SweepSchedule,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(schedule.initial_delay) => {}
                _ = shutdown_rx.recv() => {
                    debug!("Eviction sweeper stopped before first sweep");
                    return;
                }
            }

            loop {
                let sweeper = self.clone();
                match tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                    Ok(Ok(report)) => debug!("Sweep finished: {:?}", report),
                    Ok(Err(e)) => warn!("Cache sweep failed: {}", e),
                    Err(e) => warn!("Cache sweep task failed: {}", e),
                }

                tokio::select! {
                    _ = tokio::time::sleep(schedule.period) => {}
                    _ = shutdown_rx.recv() => {
                        debug!("Eviction sweeper received shutdown signal");
                        break;
                    }
                }
            }
        })
    }
}

/// Newest access first; ties broken by key so the order is stable
fn rank_by_recency(entries: &mut [EntryMeta]) {
    entries.sort_by(|a, b| {
        b.last_access
            .cmp(&a.last_access)
            .then_with(|| a.key.cmp(&b.key))
    });
}
