//! Shared application state passed to all API handlers.

use std::sync::Arc;

use forge_agent::Agent;
use forge_domain::config::Config;
use forge_oracle::OracleAdapter;
use forge_sandbox::SandboxExecutor;
use forge_store::ToolStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: ToolStore,
    pub agent: Arc<Agent>,
}

/// Assembles everything `execute`/`decide`/`search` need directly, so that
/// `AppState` doesn't have to reach through `agent` for store access.
impl AppState {
    pub fn sandbox(&self) -> &SandboxExecutor {
        &self.agent.sandbox
    }

    pub fn oracle(&self) -> &OracleAdapter {
        &self.agent.oracle
    }
}
