//! `AppState` construction: validate config, open the store, wire the
//! sandbox/oracle/agent stack. Shared by `serve` and `config validate`.

use std::sync::Arc;

use anyhow::Context;
use forge_agent::Agent;
use forge_domain::config::{Config, Severity};
use forge_oracle::OracleAdapter;
use forge_sandbox::SandboxExecutor;
use forge_store::ToolStore;

use crate::state::AppState;

pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            Severity::Warning => tracing::warn!("config: {issue}"),
            Severity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == Severity::Error).count()
        );
    }

    let store = ToolStore::open(&config.store.ledger_path)
        .with_context(|| format!("opening tool ledger at {}", config.store.ledger_path))?;
    tracing::info!(path = %config.store.ledger_path, tools = store.list(false, false, None).len(), "tool store ready");

    let sandbox = SandboxExecutor::new(store.clone(), config.sandbox.clone());
    tracing::info!(imports = ?config.sandbox.allowed_imports, "sandbox executor ready");

    let oracle = OracleAdapter::from_config(&config.oracle).context("initializing oracle adapter")?;
    tracing::info!(credentials = config.oracle.credentials.len(), "oracle adapter ready");

    let agent = Arc::new(Agent {
        store: store.clone(),
        sandbox,
        oracle,
        limits: config.agent.clone(),
        search: config.search.clone(),
    });
    tracing::info!(iter_max = config.agent.iter_max, t_max_secs = config.agent.t_max_secs, "reasoning agent ready");

    Ok(AppState { config, store, agent })
}
