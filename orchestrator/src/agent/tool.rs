//! Individual agent tools, each a thin wrapper around `Storage`,
//! `TimerScheduler`, or `ArcClient` operations.

use crate::chain::ArcClient;
use crate::storage::Storage;
use crate::timer_scheduler::TimerScheduler;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String>;
}

pub struct GetEscrowById {
    pub storage: Arc<Storage>,
}

#[derive(Deserialize)]
struct EscrowIdArgs {
    escrow_id: u64,
}

#[async_trait]
impl Tool for GetEscrowById {
    fn name(&self) -> &'static str {
        "get_escrow_by_id"
    }
    fn description(&self) -> &'static str {
        "Return the latest known state of an escrow."
    }
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String> {
        let args: EscrowIdArgs = serde_json::from_value(args)?;
        match self.storage.get_latest(args.escrow_id).await? {
            Some((prefix, data)) => Ok(serde_json::json!({ "prefix": prefix, "data": data }).to_string()),
            None => Ok(format!("Escrow for {} not found", args.escrow_id)),
        }
    }
}

pub struct SetTimer {
    pub timer: Arc<TimerScheduler>,
}

#[derive(Deserialize)]
struct SetTimerArgs {
    escrow_id: u64,
    seconds: u64,
    notes: String,
}

#[async_trait]
impl Tool for SetTimer {
    fn name(&self) -> &'static str {
        "set_timer"
    }
    fn description(&self) -> &'static str {
        "Schedules a deferred re-check for an escrow."
    }
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String> {
        let args: SetTimerArgs = serde_json::from_value(args)?;
        self.timer.set_timer(args.escrow_id, args.seconds, &args.notes).await;
        Ok(format!(
            "Timer set for escrow {} in {}s: {}",
            args.escrow_id, args.seconds, args.notes
        ))
    }
}

pub struct QueryShipment {
    pub storage: Arc<Storage>,
    pub http: reqwest::Client,
    pub shipment_feed_url: String,
}

#[derive(Deserialize)]
struct QueryShipmentArgs {
    id: String,
}

#[async_trait]
impl Tool for QueryShipment {
    fn name(&self) -> &'static str {
        "query_shipment"
    }
    fn description(&self) -> &'static str {
        "Query shipment details by ID from the external shipment feed."
    }
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String> {
        let args: QueryShipmentArgs = serde_json::from_value(args)?;
        let resp = self
            .http
            .post(format!("{}/query", self.shipment_feed_url))
            .json(&serde_json::json!({ "ids": args.id }))
            .send()
            .await?;
        if resp.status().is_success() {
            let body: serde_json::Value = resp.json().await?;
            self.storage
                .save_shipment_state(&args.id, &serde_json::to_string(&body)?)
                .await?;
            Ok(body.to_string())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            Ok(format!("Error {status}: {text}"))
        }
    }
}

pub struct ReleaseFunds {
    pub arc: Arc<ArcClient>,
}

#[derive(Deserialize)]
struct ReasonArgs {
    escrow_id: u64,
    reason: String,
}

#[async_trait]
impl Tool for ReleaseFunds {
    fn name(&self) -> &'static str {
        "release_funds"
    }
    fn description(&self) -> &'static str {
        "Release funds to the seller for a given escrow."
    }
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String> {
        let args: ReasonArgs = serde_json::from_value(args)?;
        self.arc.release(args.escrow_id, &args.reason).await?;
        Ok(format!("Released escrow {} with reason '{}'", args.escrow_id, args.reason))
    }
}

pub struct RefundFunds {
    pub arc: Arc<ArcClient>,
}

#[async_trait]
impl Tool for RefundFunds {
    fn name(&self) -> &'static str {
        "refund_funds"
    }
    fn description(&self) -> &'static str {
        "Refund the buyer for a given escrow."
    }
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String> {
        let args: ReasonArgs = serde_json::from_value(args)?;
        self.arc.refund(args.escrow_id, &args.reason).await?;
        Ok(format!("Refunded escrow {} with reason '{}'", args.escrow_id, args.reason))
    }
}

pub struct ExtendEscrow {
    pub arc: Arc<ArcClient>,
}

#[derive(Deserialize)]
struct ExtendEscrowArgs {
    escrow_id: u64,
    extra_seconds: u64,
    reason: String,
}

#[async_trait]
impl Tool for ExtendEscrow {
    fn name(&self) -> &'static str {
        "extend_escrow"
    }
    fn description(&self) -> &'static str {
        "Extend an escrow's deadline by extra_seconds."
    }
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String> {
        let args: ExtendEscrowArgs = serde_json::from_value(args)?;
        self.arc
            .extend_escrow(args.escrow_id, args.extra_seconds, &args.reason)
            .await?;
        Ok(format!(
            "Extended escrow {} by {}s, reason '{}'",
            args.escrow_id, args.extra_seconds, args.reason
        ))
    }
}

pub struct FinalizeExpiredRefund {
    pub arc: Arc<ArcClient>,
}

#[async_trait]
impl Tool for FinalizeExpiredRefund {
    fn name(&self) -> &'static str {
        "finalize_expired_refund"
    }
    fn description(&self) -> &'static str {
        "Finalize an expired escrow and refund the buyer."
    }
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String> {
        let args: ReasonArgs = serde_json::from_value(args)?;
        self.arc.finalize_expired_refund(args.escrow_id, &args.reason).await?;
        Ok(format!(
            "Finalized expired escrow {}, refunded buyer, reason '{}'",
            args.escrow_id, args.reason
        ))
    }
}
