//! Handles all interaction with the escrow contract: event listening plus
//! the agent's signed outbound calls.

use super::abi;
use super::jsonrpc::{parse_hex_u64, EvmLog, JsonRpcRequest, JsonRpcResponse, TransactionReceipt};
use super::signing::{self, LegacyTransaction};
use crate::domain::EscrowKind;
use crate::errors::{MediatorError, Result as MResult};
use crate::storage::Storage;
use reqwest::Client;
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const EVENT_SIGNATURES: &[(&str, &str)] = &[
    ("EscrowCreated", "EscrowCreated(uint256,address,address,uint256,uint256)"),
    ("ShipmentLinked", "ShipmentLinked(uint256,string)"),
    ("FundsReleased", "FundsReleased(uint256)"),
    ("FundsRefunded", "FundsRefunded(uint256)"),
    ("EscrowExtended", "EscrowExtended(uint256,uint256)"),
    ("EscrowExpired", "EscrowExpired(uint256)"),
    ("EscrowCancelled", "EscrowCancelled(uint256)"),
];

fn event_name_kind(name: &str) -> Option<EscrowKind> {
    Some(match name {
        "EscrowCreated" => EscrowKind::Created,
        "ShipmentLinked" => EscrowKind::Linked,
        "EscrowExtended" => EscrowKind::Extended,
        "EscrowCancelled" => EscrowKind::Cancelled,
        "EscrowExpired" => EscrowKind::Expired,
        "FundsRefunded" => EscrowKind::Refunded,
        "FundsReleased" => EscrowKind::Released,
        _ => return None,
    })
}

fn topic_hash(signature: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

struct DecodedEvent {
    name: &'static str,
    escrow_id: u64,
    args: serde_json::Value,
}

pub struct ArcClient {
    http: Client,
    rpc_url: String,
    contract_address: String,
    agent_private_key: [u8; 32],
    agent_address: [u8; 20],
    chain_id: u64,
    storage: Arc<Storage>,
}

impl ArcClient {
    pub fn new(
        rpc_url: &str,
        contract_address: &str,
        agent_key_hex: &str,
        chain_id: u64,
        storage: Arc<Storage>,
    ) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let agent_private_key = signing::decode_hex_private_key(agent_key_hex)?;
        let agent_address = signing::address_from_private_key(&agent_private_key)?;
        Ok(Self {
            http,
            rpc_url: rpc_url.to_string(),
            contract_address: contract_address.to_string(),
            agent_private_key,
            agent_address,
            chain_id,
            storage,
        })
    }

    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<T> {
        let request = JsonRpcRequest::new(method, params);
        let response: JsonRpcResponse<T> = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;
        if let Some(error) = response.error {
            anyhow::bail!("json-rpc error calling {method}: {} ({})", error.message, error.code);
        }
        response
            .result
            .ok_or_else(|| anyhow::anyhow!("json-rpc {method} returned no result"))
    }

    async fn block_number(&self) -> anyhow::Result<u64> {
        let hex: String = self.rpc_call("eth_blockNumber", serde_json::json!([])).await?;
        parse_hex_u64(&hex)
    }

    fn decode_log(&self, log: &EvmLog) -> Option<DecodedEvent> {
        let topic0 = log.topics.first()?;
        let name = EVENT_SIGNATURES
            .iter()
            .find(|(_, sig)| &topic_hash(sig) == topic0)
            .map(|(name, _)| *name)?;

        let escrow_id_hex = log.topics.get(1)?.strip_prefix("0x").unwrap_or("0");
        let escrow_id = u64::from_str_radix(escrow_id_hex.trim_start_matches('0'), 16).unwrap_or(0);

        let data = log.data.strip_prefix("0x").unwrap_or(&log.data);
        let args = match name {
            "ShipmentLinked" => {
                let shipment_id = decode_data_string(data).unwrap_or_default();
                serde_json::json!({ "escrowId": escrow_id, "shipmentId": shipment_id })
            }
            "EscrowExtended" => {
                let new_deadline = data
                    .get(0..64)
                    .and_then(|w| u64::from_str_radix(w.trim_start_matches('0'), 16).ok())
                    .unwrap_or(0);
                serde_json::json!({ "escrowId": escrow_id, "newDeadline": new_deadline })
            }
            _ => serde_json::json!({ "escrowId": escrow_id }),
        };

        Some(DecodedEvent { name, escrow_id, args })
    }

    /// Polls `eth_getLogs` from `start_block` onward, decoding and
    /// dispatching each escrow event, until `token` is cancelled.
    pub async fn listen_events(&self, start_block: Option<u64>, token: CancellationToken) -> anyhow::Result<()> {
        tracing::info!("arc_client: started event listener");
        let mut start = match start_block {
            Some(b) => b,
            None => loop {
                if token.is_cancelled() {
                    return Ok(());
                }
                match self.block_number().await {
                    Ok(b) => break b,
                    Err(e) => {
                        tracing::warn!(error = %e, "arc_client: transient error fetching start block, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_secs(2)) => {}
                            _ = token.cancelled() => return Ok(()),
                        }
                    }
                }
            },
        };

        loop {
            if token.is_cancelled() {
                return Ok(());
            }
            let latest = match self.block_number().await {
                Ok(latest) => latest,
                Err(e) => {
                    tracing::warn!(error = %e, "arc_client: transient error polling block number, retrying next tick");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(2)) => {}
                        _ = token.cancelled() => return Ok(()),
                    }
                    continue;
                }
            };
            if latest >= start {
                let params = serde_json::json!([{
                    "fromBlock": format!("0x{:x}", start),
                    "toBlock": format!("0x{:x}", latest),
                    "address": self.contract_address,
                }]);
                match self.rpc_call::<Vec<EvmLog>>("eth_getLogs", params).await {
                    Ok(logs) => {
                        tracing::info!(count = logs.len(), "arc_client: captured event logs");
                        for log in &logs {
                            match self.decode_log(log) {
                                Some(decoded) => {
                                    if let Err(e) = self.handle_event(decoded).await {
                                        tracing::error!(error = %e, "decode error");
                                    }
                                }
                                None => continue,
                            }
                        }
                        start = latest + 1;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "arc_client: transient error fetching logs, retrying next tick");
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(2)) => {}
                _ = token.cancelled() => return Ok(()),
            }
        }
    }

    async fn handle_event(&self, event: DecodedEvent) -> MResult<()> {
        tracing::info!(escrow_id = event.escrow_id, event = event.name, "arc_client: processing event");
        let kind = event_name_kind(event.name)
            .ok_or_else(|| MediatorError::ChainTransient(format!("unknown event {}", event.name)))?;
        self.storage
            .save_escrow_event(event.escrow_id, kind, &event.args.to_string())
            .await
    }

    async fn nonce(&self) -> anyhow::Result<u64> {
        let address = format!("0x{}", hex::encode(self.agent_address));
        let hex: String = self
            .rpc_call("eth_getTransactionCount", serde_json::json!([address, "latest"]))
            .await?;
        parse_hex_u64(&hex)
    }

    async fn send_tx(&self, data: Vec<u8>) -> anyhow::Result<TransactionReceipt> {
        let contract = signing::decode_hex_address(&self.contract_address)?;
        let nonce = self.nonce().await?;
        let tx = LegacyTransaction {
            nonce,
            gas_price: 5_000_000_000,
            gas: 500_000,
            to: contract,
            value: 0,
            data,
            chain_id: self.chain_id,
        };
        let private_key = self.agent_private_key;
        let signed = tokio::task::spawn_blocking(move || signing::sign_legacy_tx(&tx, &private_key)).await??;
        let raw = format!("0x{}", hex::encode(signed));

        let tx_hash: String = self
            .rpc_call("eth_sendRawTransaction", serde_json::json!([raw]))
            .await?;

        self.wait_for_receipt(&tx_hash).await
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> anyhow::Result<TransactionReceipt> {
        for _ in 0..30 {
            let receipt: Option<TransactionReceipt> = self
                .rpc_call("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        anyhow::bail!("timed out waiting for receipt of {tx_hash}")
    }

    fn check_receipt(receipt: &TransactionReceipt) -> MResult<()> {
        match receipt.status.as_deref() {
            Some("0x1") => Ok(()),
            Some("0x0") => Err(MediatorError::ChainPermanent(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            ))),
            _ => Err(MediatorError::ChainTransient(format!(
                "transaction {} has no status yet",
                receipt.transaction_hash
            ))),
        }
    }

    pub async fn release(&self, id: u64, reason: &str) -> MResult<()> {
        let data = abi::encode_release_funds(id, reason);
        let receipt = self
            .send_tx(data)
            .await
            .map_err(|e| MediatorError::ChainTransient(e.to_string()))?;
        Self::check_receipt(&receipt)
    }

    pub async fn refund(&self, id: u64, reason: &str) -> MResult<()> {
        let data = abi::encode_refund(id, reason);
        let receipt = self
            .send_tx(data)
            .await
            .map_err(|e| MediatorError::ChainTransient(e.to_string()))?;
        Self::check_receipt(&receipt)
    }

    pub async fn extend_escrow(&self, id: u64, secs: u64, reason: &str) -> MResult<()> {
        let data = abi::encode_extend_escrow(id, secs, reason);
        let receipt = self
            .send_tx(data)
            .await
            .map_err(|e| MediatorError::ChainTransient(e.to_string()))?;
        Self::check_receipt(&receipt)
    }

    pub async fn finalize_expired_refund(&self, id: u64, reason: &str) -> MResult<()> {
        let data = abi::encode_finalize_expired_refund(id, reason);
        let receipt = self
            .send_tx(data)
            .await
            .map_err(|e| MediatorError::ChainTransient(e.to_string()))?;
        Self::check_receipt(&receipt)
    }
}

fn decode_data_string(data: &str) -> Option<String> {
    // layout: [offset][len][bytes...] when a single dynamic `string` follows
    // the indexed args in the tail.
    if data.len() < 128 {
        return None;
    }
    let len = usize::from_str_radix(&data[64..128], 16).ok()?;
    let start = 128;
    let end = start + len * 2;
    let hex_bytes = data.get(start..end)?;
    let bytes = hex::decode(hex_bytes).ok()?;
    String::from_utf8(bytes).ok()
}
