//! Scenario test 6: fallback on DELIVERED after LINKED calls exactly one
//! chain-mutating tool.

use async_trait::async_trait;
use orchestrator::agent::{Tool, ToolRegistry};
use orchestrator::domain::EscrowKind;
use orchestrator::fallback_policy::{FallbackEntry, FallbackPolicy};
use orchestrator::kv::{KVStore, SledBackend};
use orchestrator::priority_cache::PriorityCache;
use orchestrator::storage::Storage;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct RecordingTool {
    name: &'static str,
    calls: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    response: String,
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &'static str {
        self.name
    }
    fn description(&self) -> &'static str {
        "test tool"
    }
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push((self.name.to_string(), args));
        Ok(self.response.clone())
    }
}

#[tokio::test]
async fn scenario_6_fallback_on_delivered_after_linked() {
    let dir = TempDir::new().unwrap();
    let backend = SledBackend::open(dir.path()).unwrap();
    let kv = Arc::new(KVStore::new(Box::new(backend), 30));
    let cache = Arc::new(PriorityCache::new());
    let storage = Arc::new(Storage::new(kv, cache));

    storage
        .save_escrow_event(
            7,
            EscrowKind::Linked,
            &serde_json::json!({ "escrowId": 7, "shipmentId": "ship-7" }).to_string(),
        )
        .await
        .unwrap();

    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    for (name, response) in [
        ("extend_escrow", "ok"),
        ("release_funds", "ok"),
        ("refund_funds", "ok"),
        ("set_timer", "ok"),
        ("finalize_expired_refund", "ok"),
    ] {
        registry.register(Arc::new(RecordingTool {
            name,
            calls: calls.clone(),
            response: response.to_string(),
        }));
    }
    registry.register(Arc::new(RecordingTool {
        name: "query_shipment",
        calls: calls.clone(),
        response: serde_json::json!({ "details": [{ "status": "DELIVERED" }] }).to_string(),
    }));

    let policy = FallbackPolicy::new(storage, Arc::new(registry));
    let entry = FallbackEntry { escrow_id: 7, kind: EscrowKind::Linked };
    policy.run_batch(&[entry], false).await;

    let calls = calls.lock().unwrap();
    let chain_mutating: Vec<&str> = calls
        .iter()
        .map(|(n, _)| n.as_str())
        .filter(|n| *n != "query_shipment")
        .collect();
    assert_eq!(
        chain_mutating,
        vec!["extend_escrow"],
        "only extend_escrow should run for a DELIVERED shipment on a LINKED escrow"
    );
    let extend_call = calls.iter().find(|(n, _)| n == "extend_escrow").unwrap();
    assert_eq!(extend_call.1["escrow_id"], 7);
    assert_eq!(extend_call.1["extra_seconds"], 15);
    assert_eq!(extend_call.1["reason"], "hold period");
}
