//! In-process write claims
//!
//! A key moves `Idle -> Claimed -> {Committed, Discarded}`. The registry
//! holds only claimed keys; committing or discarding releases the claim and
//! the key is idle again. Across instances the claim is backed by the
//! exclusive lock a writer holds on its body file.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use url::Url;

use super::key::CacheKey;

/// Lifecycle state of a write for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// No write in progress
    Idle,
    /// A write handle exists for the key
    Claimed,
    /// The body matched its declared length and was kept
    Committed,
    /// The body was incomplete and both files were removed
    Discarded,
}

/// Information about a claimed key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationInfo {
    /// URI being written
    pub uri: Url,
    /// When the claim was taken
    pub claimed_at: DateTime<Utc>,
    /// Length the writer promised
    pub declared_len: u64,
}

impl ReservationInfo {
    pub fn new(uri: Url, declared_len: u64) -> Self {
        Self {
            uri,
            claimed_at: Utc::now(),
            declared_len,
        }
    }
}

/// Set of keys with a write in progress
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claims: Mutex<HashMap<CacheKey, ReservationInfo>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a key; false if it is already claimed
    pub fn try_claim(&self, key: CacheKey, info: ReservationInfo) -> bool {
        let mut claims = self.claims.lock();
        if claims.contains_key(&key) {
            return false;
        }
        claims.insert(key, info);
        true
    }

    /// Release a claim, returning its info if it was held
    pub fn release(&self, key: &CacheKey) -> Option<ReservationInfo> {
        self.claims.lock().remove(key)
    }

    pub fn is_claimed(&self, key: &CacheKey) -> bool {
        self.claims.lock().contains_key(key)
    }

    /// Current state of a key as far as in-flight writes are concerned
    pub fn state(&self, key: &CacheKey) -> WriteState {
        if self.is_claimed(key) {
            WriteState::Claimed
        } else {
            WriteState::Idle
        }
    }

    /// Number of writes in progress
    pub fn len(&self) -> usize {
        self.claims.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.lock().is_empty()
    }

    /// Snapshot of all claims, oldest first
    pub fn all(&self) -> Vec<(CacheKey, ReservationInfo)> {
        let mut claims: Vec<_> = self
            .claims
            .lock()
            .iter()
            .map(|(key, info)| (*key, info.clone()))
            .collect();
        claims.sort_by(|a, b| a.1.claimed_at.cmp(&b.1.claimed_at).then_with(|| a.0.cmp(&b.0)));
        claims
    }
}
