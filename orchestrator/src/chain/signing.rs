//! Legacy-transaction signing for the agent's outbound contract calls.
//!
//! Builds an RLP-encoded legacy transaction and signs its Keccak256 digest
//! with secp256k1, computing the EIP-155 `v` from the recovery id and chain
//! id.

use anyhow::{Context, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u64,
    pub gas: u64,
    pub to: [u8; 20],
    pub value: u64,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn rlp_append_unsigned(&self, stream: &mut RlpStream) {
        stream.begin_list(9);
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas);
        stream.append(&self.to.as_slice());
        stream.append(&self.value);
        stream.append(&self.data);
        stream.append(&self.chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
    }

    fn rlp_append_signed(&self, stream: &mut RlpStream, v: u64, r: &[u8], s: &[u8]) {
        stream.begin_list(9);
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas);
        stream.append(&self.to.as_slice());
        stream.append(&self.value);
        stream.append(&self.data);
        stream.append(&v);
        stream.append(&r);
        stream.append(&s);
    }

    fn signing_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new();
        self.rlp_append_unsigned(&mut stream);
        let mut hasher = Keccak256::new();
        hasher.update(stream.out());
        hasher.finalize().into()
    }
}

/// Signs `tx` with the raw secp256k1 private key bytes, returning the
/// RLP-encoded signed transaction ready for `eth_sendRawTransaction`.
pub fn sign_legacy_tx(tx: &LegacyTransaction, private_key: &[u8; 32]) -> Result<Vec<u8>> {
    let signing_key = SigningKey::from_bytes(private_key.into())
        .context("invalid secp256k1 private key")?;
    let digest = tx.signing_hash();
    let (signature, recovery_id): (Signature, RecoveryId) = signing_key
        .sign_prehash_recoverable(&digest)
        .context("failed to sign transaction digest")?;

    let r = signature.r().to_bytes();
    let s = signature.s().to_bytes();
    let v = tx.chain_id * 2 + 35 + recovery_id.to_byte() as u64;

    let mut stream = RlpStream::new();
    tx.rlp_append_signed(&mut stream, v, r.as_slice(), s.as_slice());
    Ok(stream.out().to_vec())
}

/// Derives the 20-byte Ethereum address for a raw secp256k1 private key, used
/// to build `eth_getTransactionCount` lookups for the agent's own nonce.
pub fn address_from_private_key(private_key: &[u8; 32]) -> Result<[u8; 20]> {
    let signing_key = SigningKey::from_bytes(private_key.into())
        .context("invalid secp256k1 private key")?;
    let verifying_key = signing_key.verifying_key();
    let uncompressed = verifying_key.to_encoded_point(false);
    let mut hasher = Keccak256::new();
    hasher.update(&uncompressed.as_bytes()[1..]);
    let hash = hasher.finalize();
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    Ok(addr)
}

pub fn decode_hex_private_key(s: &str) -> Result<[u8; 32]> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).context("invalid hex private key")?;
    if bytes.len() != 32 {
        anyhow::bail!("private key must be 32 bytes, got {}", bytes.len());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

pub fn decode_hex_address(s: &str) -> Result<[u8; 20]> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).context("invalid hex address")?;
    if bytes.len() != 20 {
        anyhow::bail!("address must be 20 bytes, got {}", bytes.len());
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_derivation_is_deterministic() {
        let key = [7u8; 32];
        let a1 = address_from_private_key(&key).unwrap();
        let a2 = address_from_private_key(&key).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn signing_produces_nonempty_rlp_bytes() {
        let key = [3u8; 32];
        let tx = LegacyTransaction {
            nonce: 0,
            gas_price: 5_000_000_000,
            gas: 500_000,
            to: [1u8; 20],
            value: 0,
            data: vec![0xde, 0xad, 0xbe, 0xef],
            chain_id: 31337,
        };
        let signed = sign_legacy_tx(&tx, &key).unwrap();
        assert!(!signed.is_empty());
    }

    #[test]
    fn decode_hex_private_key_rejects_wrong_length() {
        assert!(decode_hex_private_key("0xdead").is_err());
    }
}
