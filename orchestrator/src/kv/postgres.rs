//! SQL-backed store, selected via `DB_BACKEND=postgres` (or `postgrestest`
//! for a disposable integration-test database).

use super::backend::KVBackend;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};

pub struct PostgresBackend {
    client: Mutex<Client>,
}

impl PostgresBackend {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection closed with error");
            }
        });
        client
            .execute(
                "CREATE TABLE IF NOT EXISTS trustmesh_kv (key BYTEA PRIMARY KEY, value BYTEA NOT NULL)",
                &[],
            )
            .await?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

#[async_trait]
impl KVBackend for PostgresBackend {
    async fn get(&self, key: &[u8; 32]) -> anyhow::Result<Option<Vec<u8>>> {
        let client = self.client.lock().await;
        let row = client
            .query_opt("SELECT value FROM trustmesh_kv WHERE key = $1", &[&key.as_slice()])
            .await?;
        Ok(row.map(|r| r.get::<_, Vec<u8>>(0)))
    }

    async fn put(&self, key: &[u8; 32], value: &[u8]) -> anyhow::Result<()> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO trustmesh_kv (key, value) VALUES ($1, $2) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
                &[&key.as_slice(), &value],
            )
            .await?;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
