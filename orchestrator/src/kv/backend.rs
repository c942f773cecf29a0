//! Pluggable backend trait for `KVStore`.

use async_trait::async_trait;

/// A storage backend keyed by a fixed 32-byte content hash.
#[async_trait]
pub trait KVBackend: Send + Sync {
    async fn get(&self, key: &[u8; 32]) -> anyhow::Result<Option<Vec<u8>>>;
    async fn put(&self, key: &[u8; 32], value: &[u8]) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
}
