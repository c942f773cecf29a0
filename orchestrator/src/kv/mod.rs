//! Content-addressed key/value store.
//!
//! Keys are hashed with SHA-256 before hitting the backend so storage is
//! content-addressed and fixed-width on disk; values are stored as raw bytes.
//! Reads and writes pass through a bounded LRU so repeated lookups of recent
//! escrow/shipment state avoid a backend round trip.

mod backend;
mod postgres;
mod sled_backend;

pub use backend::KVBackend;
pub use postgres::PostgresBackend;
pub use sled_backend::SledBackend;

use crate::errors::{MediatorError, Result};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

fn dighash(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Read-through, write-through key/value store fronting a pluggable backend.
pub struct KVStore {
    backend: Box<dyn KVBackend>,
    cache: Mutex<LruCache<String, String>>,
}

impl KVStore {
    pub fn new(backend: Box<dyn KVBackend>, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            backend,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Looks up `key`, serving from cache when present, otherwise reading
    /// through to the backend keyed by `dighash(key)`.
    pub async fn get(&self, key: &str) -> Result<String> {
        if key.is_empty() {
            return Err(MediatorError::InvalidArgument("key can't be empty".into()));
        }
        {
            let mut cache = self.cache.lock().await;
            if let Some(value) = cache.get(key) {
                return Ok(value.clone());
            }
        }
        let hashed = dighash(key);
        let raw = self
            .backend
            .get(&hashed)
            .await
            .map_err(MediatorError::BackendFailure)?
            .ok_or_else(|| MediatorError::NotFound(format!("value for key {key} not found")))?;
        let decoded = String::from_utf8(raw)
            .map_err(|e| MediatorError::BackendFailure(anyhow::anyhow!(e)))?;
        self.cache.lock().await.put(key.to_string(), decoded.clone());
        Ok(decoded)
    }

    /// Writes `value` under `key` to the backend, then updates the cache only
    /// once the backend commit succeeds, so a failed write never leaves the
    /// cache holding data that was never durably stored.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(MediatorError::InvalidArgument("key can't be empty".into()));
        }
        if value.is_empty() {
            return Err(MediatorError::InvalidArgument("value can't be empty".into()));
        }
        let hashed = dighash(key);
        self.backend
            .put(&hashed, value.as_bytes())
            .await
            .map_err(MediatorError::BackendFailure)?;
        self.cache.lock().await.put(key.to_string(), value.to_string());
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await.map_err(MediatorError::BackendFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct MemBackend(StdMutex<HashMap<[u8; 32], Vec<u8>>>);

    #[async_trait::async_trait]
    impl KVBackend for MemBackend {
        async fn get(&self, key: &[u8; 32]) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }
        async fn put(&self, key: &[u8; 32], value: &[u8]) -> anyhow::Result<()> {
            self.0.lock().unwrap().insert(*key, value.to_vec());
            Ok(())
        }
        async fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn store() -> KVStore {
        KVStore::new(Box::new(MemBackend(StdMutex::new(HashMap::new()))), 30)
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let kv = store();
        kv.put("ec:1", "hello").await.unwrap();
        assert_eq!(kv.get("ec:1").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn empty_key_is_invalid_argument() {
        let kv = store();
        assert!(matches!(
            kv.put("", "x").await,
            Err(MediatorError::InvalidArgument(_))
        ));
        assert!(matches!(
            kv.get("").await,
            Err(MediatorError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn empty_value_is_invalid_argument() {
        let kv = store();
        assert!(matches!(
            kv.put("ec:1", "").await,
            Err(MediatorError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let kv = store();
        assert!(matches!(kv.get("missing").await, Err(MediatorError::NotFound(_))));
    }

    #[tokio::test]
    async fn cache_serves_without_hitting_backend_again() {
        let kv = store();
        kv.put("ec:1", "v1").await.unwrap();
        // mutate the backend directly to prove the cache, not the backend, answers.
        kv.backend.put(&dighash("ec:1"), b"v2").await.unwrap();
        assert_eq!(kv.get("ec:1").await.unwrap(), "v1");
    }
}
