//! Embedded ordered-store backend, the default when `DB_BACKEND` is unset.
//!
//! A single on-disk tree keyed by content hash. `sled` is used instead of a
//! raw lmdb binding since it ships its own safe, pure-Rust storage engine with
//! the same ordered-map semantics.

use super::backend::KVBackend;
use async_trait::async_trait;
use std::path::Path;

pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl KVBackend for SledBackend {
    async fn get(&self, key: &[u8; 32]) -> anyhow::Result<Option<Vec<u8>>> {
        let db = self.db.clone();
        let key = *key;
        tokio::task::spawn_blocking(move || {
            Ok(db.get(key)?.map(|ivec| ivec.to_vec()))
        })
        .await?
    }

    async fn put(&self, key: &[u8; 32], value: &[u8]) -> anyhow::Result<()> {
        let db = self.db.clone();
        let key = *key;
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || {
            db.insert(key, value)?;
            Ok(())
        })
        .await?
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
