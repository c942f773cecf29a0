//! TrustMesh Orchestrator
//!
//! An event-driven mediator that watches escrow lifecycle events on chain,
//! cross-references off-chain shipment telemetry, and drives escrows to
//! resolution (release, refund, or hold) — either through an LLM-backed
//! agent or, when that fails, a deterministic fallback policy.

pub mod agent;
pub mod batch_runner;
pub mod chain;
pub mod config;
pub mod domain;
pub mod errors;
pub mod fallback_policy;
pub mod kv;
pub mod orchestrator;
pub mod priority_cache;
pub mod storage;
pub mod timer_scheduler;

pub use config::Config;
pub use errors::MediatorError;
pub use orchestrator::Orchestrator;
