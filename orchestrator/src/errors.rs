//! Domain error kinds mirroring the propagation policy of the mediator.
//!
//! `KVStore`/`Storage` return `MediatorError` directly so callers can match on
//! kind; the outer orchestration loops (`BatchRunner`, `TimerScheduler`,
//! `ArcClient`) work in `anyhow::Result` and wrap these via `#[from]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediatorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend failure: {0}")]
    BackendFailure(#[source] anyhow::Error),

    #[error("chain transient error: {0}")]
    ChainTransient(String),

    #[error("chain permanent error: {0}")]
    ChainPermanent(String),

    #[error("agent invocation failed: {0}")]
    AgentFailure(#[source] anyhow::Error),

    #[error("tool failure: {0}")]
    ToolFailure(String),
}

pub type Result<T> = std::result::Result<T, MediatorError>;
