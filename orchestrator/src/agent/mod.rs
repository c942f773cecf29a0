//! Agent facade: LLM executor, null fallback stand-in, and the explicit
//! tool registry that replaces decorator-based tool registration.

mod agent;
mod registry;
mod tool;

pub use agent::{Agent, NullAgent, ToolCallingAgent};
pub use registry::ToolRegistry;
pub use tool::{
    ExtendEscrow, FinalizeExpiredRefund, GetEscrowById, QueryShipment, RefundFunds, ReleaseFunds,
    SetTimer, Tool,
};
