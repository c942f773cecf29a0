//! Configuration Management Module
//!
//! Mediator configuration is sourced entirely from environment variables;
//! there is no config file to parse.

use serde::{Deserialize, Serialize};

/// Selects which `KVBackend` implementation `KVStore` should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbBackend {
    Lmdb,
    Postgres,
    PostgresTest,
}

impl DbBackend {
    fn from_env_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => DbBackend::Postgres,
            "postgrestest" => DbBackend::PostgresTest,
            _ => DbBackend::Lmdb,
        }
    }
}

/// Chain connection settings consumed by the `ArcClient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_url: String,
    pub contract_address: String,
    pub agent_key: String,
}

/// Agent/model connection settings, forwarded verbatim to the agent facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub model_api_key: Option<String>,
    pub model_temperature: f64,
    pub model_max_tokens: u32,
    pub model_base_url: Option<String>,
    pub model_provider: String,
}

/// Batch dispatcher tuning parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchConfig {
    pub threshold: usize,
    pub interval_seconds: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            interval_seconds: 5,
        }
    }
}

/// Top-level service configuration, assembled from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub db_backend: DbBackend,
    pub db_path: String,
    pub kv_cache_capacity: usize,
    pub chain: ChainConfig,
    pub model: ModelConfig,
    pub batch: BatchConfig,
}

impl Config {
    /// Loads configuration from the process environment, applying the
    /// defaults named in the external-interfaces contract.
    pub fn from_env() -> anyhow::Result<Self> {
        let db_backend = std::env::var("DB_BACKEND")
            .map(|s| DbBackend::from_env_str(&s))
            .unwrap_or(DbBackend::Lmdb);

        let chain = ChainConfig {
            chain_url: std::env::var("CHAIN_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            contract_address: std::env::var("CONTRACT_ADDRESS").unwrap_or_default(),
            agent_key: std::env::var("AGENT_KEY").unwrap_or_default(),
        };

        let model = ModelConfig {
            model_name: std::env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4.1-nano".to_string()),
            model_api_key: std::env::var("MODEL_API_KEY").ok(),
            model_temperature: std::env::var("MODEL_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.1),
            model_max_tokens: std::env::var("MODEL_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            model_base_url: std::env::var("MODEL_BASE_URL").ok(),
            model_provider: std::env::var("MODEL_PROVIDER")
                .unwrap_or_else(|_| "openai".to_string()),
        };

        Ok(Self {
            db_backend,
            db_path: std::env::var("TRUSTMESH_DB_PATH")
                .unwrap_or_else(|_| "trustmesh.db".to_string()),
            kv_cache_capacity: 30,
            chain,
            model,
            batch: BatchConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_backend_parses_case_insensitively() {
        assert_eq!(DbBackend::from_env_str("Postgres"), DbBackend::Postgres);
        assert_eq!(DbBackend::from_env_str("postgrestest"), DbBackend::PostgresTest);
        assert_eq!(DbBackend::from_env_str("lmdb"), DbBackend::Lmdb);
        assert_eq!(DbBackend::from_env_str("anything-else"), DbBackend::Lmdb);
    }
}
