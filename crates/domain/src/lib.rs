//! Shared types for the tool store, sandbox, oracle, agent and gateway
//! crates: the [`tool::Tool`] entity, the crate-wide [`error::Error`]
//! taxonomy, the per-question [`event`] stream, the agent [`fsm`], and
//! [`config::Config`].

pub mod config;
pub mod error;
pub mod event;
pub mod fsm;
pub mod tool;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{Action, ActionResult, AgentEvent, Confidence, IterationRecord, Scratchpad};
pub use fsm::AgentState;
pub use tool::{BugEntry, ParameterSpec, ParameterType, Tool, ToolPatch, ToolSpec};
