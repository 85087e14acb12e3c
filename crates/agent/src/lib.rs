//! The reasoning agent: drives the oracle/store/sandbox FSM loop for one
//! question at a time and streams [`forge_domain::AgentEvent`]s as it goes.

pub mod fsm;
pub mod prompt;

pub use fsm::{Agent, TurnOptions};
