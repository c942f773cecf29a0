//! TrustMesh Orchestrator Service
//!
//! Watches escrow lifecycle events on chain, mediates them against off-chain
//! shipment telemetry via an LLM agent, and falls back to a deterministic
//! policy whenever the agent is unavailable or errors.

use anyhow::Result;
use orchestrator::{Config, Orchestrator};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting TrustMesh Orchestrator");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let orchestrator = Orchestrator::build(config).await?;
    info!("Orchestrator components initialized");

    let token = CancellationToken::new();
    let shutdown_token = token.clone();
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    orchestrator.run(token).await?;

    Ok(())
}
