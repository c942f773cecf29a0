//! Wires every component together and drives the three concurrent loops:
//! chain event listener, timer scheduler, and batch runner.

use crate::agent::{
    Agent, ExtendEscrow, FinalizeExpiredRefund, GetEscrowById, NullAgent, QueryShipment,
    RefundFunds, ReleaseFunds, SetTimer, ToolCallingAgent, ToolRegistry,
};
use crate::chain::ArcClient;
use crate::config::Config;
use crate::domain::EscrowRef;
use crate::fallback_policy::{FallbackEntry, FallbackPolicy};
use crate::kv::{KVStore, PostgresBackend, SledBackend};
use crate::priority_cache::PriorityCache;
use crate::storage::Storage;
use crate::timer_scheduler::TimerScheduler;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_SYSTEM_PROMPT: &str = "You mediate escrow lifecycles between on-chain state and shipment telemetry.";

pub struct Orchestrator {
    storage: Arc<Storage>,
    cache: Arc<PriorityCache>,
    timer: Arc<TimerScheduler>,
    arc: Arc<ArcClient>,
    agent: Arc<dyn Agent>,
    fallback: Arc<FallbackPolicy>,
    batch_threshold: usize,
    batch_interval_secs: u64,
}

impl Orchestrator {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let kv_backend: Box<dyn crate::kv::KVBackend> = match config.db_backend {
            crate::config::DbBackend::Lmdb => Box::new(SledBackend::open(&config.db_path)?),
            crate::config::DbBackend::Postgres | crate::config::DbBackend::PostgresTest => {
                let url = std::env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set for postgres backends"))?;
                Box::new(PostgresBackend::connect(&url).await?)
            }
        };
        let kv = Arc::new(KVStore::new(kv_backend, config.kv_cache_capacity));
        let cache = Arc::new(PriorityCache::new());
        let storage = Arc::new(Storage::new(kv, cache.clone()));
        let timer = Arc::new(TimerScheduler::new());

        let arc = Arc::new(ArcClient::new(
            &config.chain.chain_url,
            &config.chain.contract_address,
            &config.chain.agent_key,
            chain_id_from_env(),
            storage.clone(),
        )?);

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(GetEscrowById { storage: storage.clone() }));
        registry.register(Arc::new(SetTimer { timer: timer.clone() }));
        registry.register(Arc::new(QueryShipment {
            storage: storage.clone(),
            http: reqwest::Client::new(),
            shipment_feed_url: std::env::var("SHIPMENT_FEED_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
        }));
        registry.register(Arc::new(ReleaseFunds { arc: arc.clone() }));
        registry.register(Arc::new(RefundFunds { arc: arc.clone() }));
        registry.register(Arc::new(ExtendEscrow { arc: arc.clone() }));
        registry.register(Arc::new(FinalizeExpiredRefund { arc: arc.clone() }));
        let tools = Arc::new(registry);

        let agent: Arc<dyn Agent> = if config.model.model_api_key.is_some() {
            Arc::new(ToolCallingAgent::new(
                config.model.clone(),
                DEFAULT_SYSTEM_PROMPT.to_string(),
                tools.clone(),
            ))
        } else {
            tracing::warn!("no MODEL_API_KEY configured, running with NullAgent (fallback-only)");
            Arc::new(NullAgent)
        };

        let fallback = Arc::new(FallbackPolicy::new(storage.clone(), tools));

        Ok(Self {
            storage,
            cache,
            timer,
            arc,
            agent,
            fallback,
            batch_threshold: config.batch.threshold,
            batch_interval_secs: config.batch.interval_seconds,
        })
    }

    /// Runs all three loops until `token` is cancelled, then flushes storage.
    pub async fn run(self, token: CancellationToken) -> anyhow::Result<()> {
        let batch_runner = crate::batch_runner::BatchRunner::new(
            self.cache.clone(),
            self.batch_threshold,
            self.batch_interval_secs,
        );

        let agent_for_batch = self.agent.clone();
        let fallback_for_batch = self.fallback.clone();
        let batch_token = token.clone();
        let batch_task = tokio::spawn(async move {
            batch_runner
                .run(
                    move |batch: Vec<EscrowRef>| {
                        let agent = agent_for_batch.clone();
                        let fallback = fallback_for_batch.clone();
                        async move {
                            let message = serde_json::json!({
                                "batch": batch.iter().map(|e| serde_json::json!({
                                    "escrow_id": e.escrow_id,
                                    "kind": format!("{:?}", e.kind),
                                    "seen_count": e.seen_count,
                                })).collect::<Vec<_>>(),
                            });
                            match agent.invoke(&format!("Process escrow event: {message}")).await {
                                Ok(_) => Ok(()),
                                Err(e) => {
                                    tracing::warn!(error = %e, "batch falling back to manual handling");
                                    let entries: Vec<FallbackEntry> = batch
                                        .iter()
                                        .map(|e| FallbackEntry { escrow_id: e.escrow_id, kind: e.kind })
                                        .collect();
                                    fallback.run_batch(&entries, false).await;
                                    Ok(())
                                }
                            }
                        }
                    },
                    batch_token,
                )
                .await;
        });

        let agent_for_timer = self.agent.clone();
        let fallback_for_timer = self.fallback.clone();
        let storage_for_timer = self.storage.clone();
        let timer = self.timer.clone();
        let timer_token = token.clone();
        let timer_task = tokio::spawn(async move {
            timer
                .run(
                    move |entry| {
                        let agent = agent_for_timer.clone();
                        let fallback = fallback_for_timer.clone();
                        let storage = storage_for_timer.clone();
                        async move {
                            let message = serde_json::json!({
                                "escrow_id": entry.escrow_id,
                                "reason": entry.reason,
                                "attempts": entry.attempt,
                                "due_at": entry.due_at,
                            });
                            if let Err(e) = agent
                                .invoke(&format!("Set timer elapsed: {message}"))
                                .await
                            {
                                tracing::warn!(error = %e, "timer callback falling back to manual handling");
                                let kind = match storage.get_escrow_by_id(entry.escrow_id).await {
                                    Ok(states) => states
                                        .last()
                                        .and_then(|(k, _)| k.split(':').next().and_then(crate::domain::EscrowKind::from_prefix))
                                        .unwrap_or(crate::domain::EscrowKind::Created),
                                    Err(_) => crate::domain::EscrowKind::Created,
                                };
                                fallback
                                    .run_batch(
                                        &[FallbackEntry { escrow_id: entry.escrow_id, kind }],
                                        true,
                                    )
                                    .await;
                            }
                        }
                    },
                    timer_token,
                )
                .await;
        });

        let arc_token = token.clone();
        let arc = self.arc.clone();
        let listen_task = tokio::spawn(async move {
            if let Err(e) = arc.listen_events(None, arc_token).await {
                tracing::error!(error = %e, "arc_client: event listener stopped with error");
            }
        });

        token.cancelled().await;
        tracing::info!("shutdown signal received, stopping tasks");
        let _ = tokio::join!(batch_task, timer_task, listen_task);
        self.storage.close().await?;
        tracing::info!("shutdown complete");
        Ok(())
    }
}

fn chain_id_from_env() -> u64 {
    std::env::var("CHAIN_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(31337)
}
