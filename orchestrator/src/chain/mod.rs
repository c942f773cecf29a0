//! On-chain escrow contract integration: event decoding and signed outbound
//! calls, built directly on JSON-RPC rather than a full ABI client library.

mod abi;
mod client;
mod jsonrpc;
mod signing;

pub use client::ArcClient;
