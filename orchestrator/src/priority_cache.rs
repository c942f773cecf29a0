//! Holds references to escrows awaiting AI attention, ordered by priority.

use crate::domain::{now, EscrowKind, EscrowRef, Timestamp};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    entries: HashMap<u64, EscrowRef>,
}

pub struct PriorityCache {
    inner: Mutex<Inner>,
}

impl PriorityCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Adds an escrow to the cache if not already present; does nothing for
    /// an id already tracked.
    pub async fn add(&self, escrow_id: u64, kind: EscrowKind, at: Timestamp) {
        tracing::info!(escrow_id, ?kind, "cache: adding");
        let mut inner = self.inner.lock().await;
        inner
            .entries
            .entry(escrow_id)
            .or_insert_with(|| EscrowRef::new(escrow_id, kind, at));
    }

    /// Selects up to `size` escrows for processing, marking them locked and
    /// bumping their attempt count, without removing them from the cache.
    /// Caller releases them after processing.
    pub async fn pop_batch(&self, size: usize) -> Vec<EscrowRef> {
        let mut inner = self.inner.lock().await;
        let mut refs: Vec<EscrowRef> = inner.entries.values().cloned().collect();
        refs.sort();
        refs.truncate(size);
        let picked_at = now();
        for r in &refs {
            if let Some(entry) = inner.entries.get_mut(&r.escrow_id) {
                entry.locked = true;
                entry.seen_count += 1;
                entry.last_seen_at = picked_at;
            }
        }
        // Re-read post-update state so callers see the bumped counters.
        refs.iter()
            .filter_map(|r| inner.entries.get(&r.escrow_id).cloned())
            .collect()
    }

    /// Removes an escrow from the cache entirely.
    pub async fn release(&self, escrow_id: u64) {
        tracing::info!(escrow_id, "cache: releasing");
        self.inner.lock().await.entries.remove(&escrow_id);
    }

    /// Clears a locked entry back to unlocked without removing it, used when
    /// a batch fails downstream and must be retried.
    pub async fn unlock(&self, escrow_id: u64) {
        if let Some(entry) = self.inner.lock().await.entries.get_mut(&escrow_id) {
            entry.locked = false;
        }
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}

impl Default for PriorityCache {
    fn default() -> Self {
        Self::new()
    }
}
