//! Deterministic fallback dispatch, invoked whenever the agent facade fails
//! to process a batch or timer callback. This is the tested core of the
//! mediator's decision logic.

use crate::agent::ToolRegistry;
use crate::domain::EscrowKind;
use crate::storage::Storage;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
struct EscrowPayload {
    #[serde(rename = "escrowId")]
    escrow_id: Option<u64>,
    #[serde(rename = "shipmentId")]
    shipment_id: Option<String>,
}

#[derive(Deserialize)]
struct ShipmentDetail {
    status: String,
}

#[derive(Deserialize)]
struct ShipmentQueryResponse {
    details: Vec<ShipmentDetail>,
}

/// One cache entry to run through the fallback dispatch table. Mirrors the
/// subset of `EscrowRef` the policy actually needs.
pub struct FallbackEntry {
    pub escrow_id: u64,
    pub kind: EscrowKind,
}

pub struct FallbackPolicy {
    storage: Arc<Storage>,
    tools: Arc<ToolRegistry>,
}

impl FallbackPolicy {
    pub fn new(storage: Arc<Storage>, tools: Arc<ToolRegistry>) -> Self {
        Self { storage, tools }
    }

    /// Runs the fallback decision for a whole batch. `timer_triggered` is set
    /// only on the timer-callback path; only then is `release_funds` actually
    /// invoked instead of scheduling another timer.
    pub async fn run_batch(&self, entries: &[FallbackEntry], timer_triggered: bool) {
        for entry in entries {
            if let Err(e) = self.run_one(entry, timer_triggered).await {
                tracing::error!(escrow_id = entry.escrow_id, error = %e, "fallback_policy: processing failed");
            }
        }
    }

    async fn run_one(&self, entry: &FallbackEntry, timer_triggered: bool) -> anyhow::Result<()> {
        if entry.kind == EscrowKind::Expired {
            // Idempotence guard: a batch can be re-handed to the fallback
            // after a prior finalize already landed. Skip if already terminal.
            if let Some((prefix, _)) = self.storage.get_latest(entry.escrow_id).await? {
                if let Some(kind) = EscrowKind::from_prefix(&prefix) {
                    if kind.is_terminal() {
                        return Ok(());
                    }
                }
            }
            tracing::warn!(escrow_id = entry.escrow_id, "fallback_policy: refunding expired escrow");
            self.tools
                .invoke(
                    "finalize_expired_refund",
                    serde_json::json!({ "escrow_id": entry.escrow_id, "reason": "escrow expired" }),
                )
                .await?;
            return Ok(());
        }

        tracing::info!(escrow_id = entry.escrow_id, "fallback_policy: retrieving escrow details from storage");
        let (prefix, raw_details) = match self.storage.get_latest(entry.escrow_id).await? {
            Some(v) => v,
            None => return Ok(()),
        };
        let kind = EscrowKind::from_prefix(&prefix).unwrap_or(EscrowKind::Created);
        let details: EscrowPayload = serde_json::from_str(&raw_details)?;

        if details.escrow_id != Some(entry.escrow_id) {
            // security check: payload doesn't agree with cache entry, abort.
            return Ok(());
        }
        let shipment_id = match &details.shipment_id {
            Some(id) => id.clone(),
            None => return Ok(()),
        };

        tracing::info!(escrow_id = entry.escrow_id, shipment_id = %shipment_id, "fallback_policy: requesting shipment details");
        let raw_status = self
            .tools
            .invoke("query_shipment", serde_json::json!({ "id": shipment_id }))
            .await?;
        let query: ShipmentQueryResponse = serde_json::from_str(&raw_status)?;
        let status = query
            .details
            .first()
            .map(|d| d.status.to_uppercase())
            .unwrap_or_default();
        tracing::info!(escrow_id = entry.escrow_id, status = %status, "fallback_policy: shipment status");

        match status.as_str() {
            "DELIVERED" => self.on_delivered(entry.escrow_id, kind, timer_triggered).await?,
            "IN-TRANSIT" => {
                if timer_triggered {
                    self.set_timer(entry.escrow_id, 5, "shipment still in Transit").await?;
                }
            }
            s if s.contains("DELAY") => {
                self.set_timer(entry.escrow_id, 10, "shipment face a certain delay").await?;
            }
            s if s.contains("ANOMALY") => {
                self.tools
                    .invoke(
                        "refund_funds",
                        serde_json::json!({
                            "escrow_id": entry.escrow_id,
                            "reason": "Scamming(Fraud) detected refunding",
                        }),
                    )
                    .await?;
            }
            _ => {
                self.set_timer(entry.escrow_id, 5, "waiting for more details").await?;
            }
        }

        Ok(())
    }

    async fn on_delivered(&self, escrow_id: u64, kind: EscrowKind, timer_triggered: bool) -> anyhow::Result<()> {
        match kind {
            EscrowKind::Linked => {
                self.tools
                    .invoke(
                        "extend_escrow",
                        serde_json::json!({ "escrow_id": escrow_id, "extra_seconds": 15, "reason": "hold period" }),
                    )
                    .await?;
            }
            EscrowKind::Extended => {
                if timer_triggered {
                    let result = self
                        .tools
                        .invoke(
                            "release_funds",
                            serde_json::json!({
                                "escrow_id": escrow_id,
                                "reason": "no complain from user and hold period passed",
                            }),
                        )
                        .await;
                    if result.is_err() {
                        tracing::error!(escrow_id, "fallback_policy: error while releasing funds");
                        self.set_timer(escrow_id, 10, "rescheduling release").await?;
                    }
                } else {
                    self.set_timer(escrow_id, 45, "release funds").await?;
                }
            }
            other => {
                tracing::error!(escrow_id, kind = ?other, "fallback_policy: reached wrong section");
            }
        }
        Ok(())
    }

    async fn set_timer(&self, escrow_id: u64, seconds: u64, notes: &str) -> anyhow::Result<()> {
        self.tools
            .invoke(
                "set_timer",
                serde_json::json!({ "escrow_id": escrow_id, "seconds": seconds, "notes": notes }),
            )
            .await?;
        Ok(())
    }
}
