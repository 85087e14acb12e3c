//! The HTTP gateway: REST tool-store surface plus the streaming/collected
//! `ask` entry points over the reasoning agent.

pub mod api;
pub mod bootstrap;
pub mod orchestrator;
pub mod state;
