//! Persistence layer sitting between the chain client and the priority cache.
//!
//! CREATED, REFUNDED and RELEASED events are persisted but never enter the
//! cache; LINKED, EXTENDED, CANCELLED and EXPIRED events are persisted and
//! queued for AI attention.

use crate::domain::{now, EscrowKind, LATEST_PROBE_ORDER};
use crate::errors::{MediatorError, Result};
use crate::kv::KVStore;
use crate::priority_cache::PriorityCache;
use std::sync::Arc;

pub struct Storage {
    kv: Arc<KVStore>,
    cache: Arc<PriorityCache>,
}

impl Storage {
    pub fn new(kv: Arc<KVStore>, cache: Arc<PriorityCache>) -> Self {
        Self { kv, cache }
    }

    /// Persists an escrow event, queuing it for AI attention when its kind
    /// is cache-eligible.
    pub async fn save_escrow_event(
        &self,
        escrow_id: u64,
        kind: EscrowKind,
        event_data: &str,
    ) -> Result<()> {
        let key = format!("{}:{}", kind.prefix(), escrow_id);
        tracing::info!(escrow_id, ?kind, "storage: saving escrow event");
        self.kv.put(&key, event_data).await?;
        if kind.is_cache_eligible() {
            self.cache.add(escrow_id, kind, now()).await;
        }
        Ok(())
    }

    /// Retrieves every known state for `escrow_id`, keyed by `"{prefix}:{id}"`.
    /// Absent prefixes are simply omitted, not an error.
    pub async fn get_escrow_by_id(&self, escrow_id: u64) -> Result<Vec<(String, String)>> {
        tracing::info!(escrow_id, "storage: retrieving escrow states");
        let mut result = Vec::new();
        for prefix in LATEST_PROBE_ORDER.iter().rev() {
            let key = format!("{prefix}:{escrow_id}");
            match self.kv.get(&key).await {
                Ok(value) => result.push((key, value)),
                Err(MediatorError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    /// Returns the most recently reached lifecycle state for `escrow_id`, if
    /// any state has been recorded, probing terminal/expiry states first.
    pub async fn get_latest(&self, escrow_id: u64) -> Result<Option<(String, String)>> {
        tracing::info!(escrow_id, "storage: retrieving latest state");
        for prefix in LATEST_PROBE_ORDER {
            let key = format!("{prefix}:{escrow_id}");
            match self.kv.get(&key).await {
                Ok(value) => return Ok(Some((prefix.to_string(), value))),
                Err(MediatorError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    pub async fn save_shipment_state(&self, shipment_id: &str, details: &str) -> Result<()> {
        self.kv.put(&format!("ship:{shipment_id}"), details).await
    }

    pub async fn get_shipment_state(&self, shipment_id: &str) -> Result<String> {
        self.kv.get(&format!("ship:{shipment_id}")).await
    }

    pub async fn close(&self) -> Result<()> {
        self.kv.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::SledBackend;
    use tempfile::TempDir;

    async fn storage() -> (Storage, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        let kv = Arc::new(KVStore::new(Box::new(backend), 30));
        let cache = Arc::new(PriorityCache::new());
        (Storage::new(kv, cache), dir)
    }

    #[tokio::test]
    async fn created_events_are_persisted_but_not_cached() {
        let (storage, _dir) = storage().await;
        storage
            .save_escrow_event(1, EscrowKind::Created, "{}")
            .await
            .unwrap();
        assert_eq!(storage.cache.size().await, 0);
        let latest = storage.get_latest(1).await.unwrap();
        assert_eq!(latest.unwrap().0, "ec");
    }

    #[tokio::test]
    async fn linked_events_are_cached() {
        let (storage, _dir) = storage().await;
        storage
            .save_escrow_event(2, EscrowKind::Linked, "{}")
            .await
            .unwrap();
        assert_eq!(storage.cache.size().await, 1);
    }

    #[tokio::test]
    async fn latest_prefers_terminal_and_expiry_states() {
        let (storage, _dir) = storage().await;
        storage
            .save_escrow_event(3, EscrowKind::Created, "{}")
            .await
            .unwrap();
        storage
            .save_escrow_event(3, EscrowKind::Linked, "{}")
            .await
            .unwrap();
        storage
            .save_escrow_event(3, EscrowKind::Released, "{}")
            .await
            .unwrap();
        let latest = storage.get_latest(3).await.unwrap().unwrap();
        assert_eq!(latest.0, "rl");
    }

    #[tokio::test]
    async fn unknown_escrow_has_no_latest_state() {
        let (storage, _dir) = storage().await;
        assert!(storage.get_latest(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn shipment_state_roundtrips() {
        let (storage, _dir) = storage().await;
        storage.save_shipment_state("ship-1", "in-transit").await.unwrap();
        assert_eq!(storage.get_shipment_state("ship-1").await.unwrap(), "in-transit");
    }
}
