//! Hand-rolled ABI encoding for the handful of contract calls the agent
//! issues. No general-purpose encoder: each function's calldata layout is
//! written out explicitly rather than reaching for a full ABI codec crate.

use sha3::{Digest, Keccak256};

pub fn selector(signature: &str) -> [u8; 4] {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    let hash = hasher.finalize();
    [hash[0], hash[1], hash[2], hash[3]]
}

fn word_u256(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn tail_string(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = word_u256(bytes.len() as u128).to_vec();
    out.extend_from_slice(bytes);
    let padding = (32 - (bytes.len() % 32)) % 32;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

/// `releaseFunds(uint256 id, string reason)`
pub fn encode_release_funds(id: u64, reason: &str) -> Vec<u8> {
    let mut data = selector("releaseFunds(uint256,string)").to_vec();
    data.extend_from_slice(&word_u256(id as u128));
    data.extend_from_slice(&word_u256(64));
    data.extend_from_slice(&tail_string(reason));
    data
}

/// `refund(uint256 id, string reason)`
pub fn encode_refund(id: u64, reason: &str) -> Vec<u8> {
    let mut data = selector("refund(uint256,string)").to_vec();
    data.extend_from_slice(&word_u256(id as u128));
    data.extend_from_slice(&word_u256(64));
    data.extend_from_slice(&tail_string(reason));
    data
}

/// `extendEscrow(uint256 id, uint256 secs, string reason)`
pub fn encode_extend_escrow(id: u64, secs: u64, reason: &str) -> Vec<u8> {
    let mut data = selector("extendEscrow(uint256,uint256,string)").to_vec();
    data.extend_from_slice(&word_u256(id as u128));
    data.extend_from_slice(&word_u256(secs as u128));
    data.extend_from_slice(&word_u256(96));
    data.extend_from_slice(&tail_string(reason));
    data
}

/// `finalizeExpiredRefund(uint256 id, string reason)`
pub fn encode_finalize_expired_refund(id: u64, reason: &str) -> Vec<u8> {
    let mut data = selector("finalizeExpiredRefund(uint256,string)").to_vec();
    data.extend_from_slice(&word_u256(id as u128));
    data.extend_from_slice(&word_u256(64));
    data.extend_from_slice(&tail_string(reason));
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_funds_calldata_starts_with_selector() {
        let data = encode_release_funds(42, "no complaints");
        assert_eq!(&data[0..4], &selector("releaseFunds(uint256,string)"));
    }

    #[test]
    fn string_tail_pads_to_32_byte_boundary() {
        let data = encode_refund(1, "abc");
        assert_eq!(data.len() % 32, 4 % 32, "selector (4 bytes) plus whole 32-byte words");
    }
}
