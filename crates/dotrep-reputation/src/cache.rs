//! Idempotent report cache keyed by snapshot fingerprint.
//!
//! The same fingerprint always maps to the same report, so concurrent inserts
//! for one key are interchangeable and the last writer wins. The cache is
//! bounded: once `max_entries` distinct keys are present, new keys are not
//! stored, while existing keys may still be overwritten.
//!
//! Slots are reserved on an atomic counter while the key's shard is locked,
//! so concurrent inserts of distinct keys never push the cache past its bound.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::fingerprint::{to_hex, Fingerprint};
use crate::report::ScoreReport;

/// Default bound on cached reports.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Concurrent fingerprint → report cache.
#[derive(Debug)]
pub struct ReportCache {
    entries: DashMap<Fingerprint, Arc<ScoreReport>>,
    /// Distinct keys stored; never exceeds `max_entries`.
    stored: AtomicUsize,
    max_entries: usize,
}

impl ReportCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            stored: AtomicUsize::new(0),
            max_entries,
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<ScoreReport>> {
        self.entries.get(fingerprint).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `report` under `fingerprint`. Returns whether it was stored.
    pub fn insert(&self, fingerprint: Fingerprint, report: Arc<ScoreReport>) -> bool {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(report);
                true
            }
            Entry::Vacant(vacant) => {
                let max = self.max_entries;
                let reserved = self
                    .stored
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < max).then_some(n + 1)
                    })
                    .is_ok();
                if !reserved {
                    tracing::debug!(
                        fingerprint = %to_hex(vacant.key()),
                        max_entries = max,
                        "report cache full; not storing"
                    );
                    return false;
                }
                vacant.insert(report);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&self) {
        self.entries.retain(|_, _| {
            self.stored.fetch_sub(1, Ordering::AcqRel);
            false
        });
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
