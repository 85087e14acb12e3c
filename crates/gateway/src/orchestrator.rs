//! The streaming orchestrator: one entry point per question. Spawns the
//! agent's turn loop onto a bounded channel and exposes it either as a
//! stream of events or, collected, as a single final answer.

use std::sync::Arc;

use forge_agent::{Agent, TurnOptions};
use forge_domain::{AgentEvent, Confidence};
use tokio::sync::mpsc::{self, Receiver};

/// Events buffered before AG blocks on a stalled consumer. AG's `t_max`
/// keeps counting while blocked — this only bounds memory, not time.
const CHANNEL_CAPACITY: usize = 64;

/// Starts a turn and returns the receiving half of its event stream.
/// Dropping the receiver is how a disconnected streaming client cancels
/// the turn: the agent's next `tx.send` fails and it stops emitting.
pub fn ask(agent: Arc<Agent>, question: String, options: TurnOptions) -> Receiver<AgentEvent> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(async move {
        agent.run_turn(question, options, tx).await;
    });
    rx
}

/// Outcome of [`ask_sync`]: either the terminal answer or an error/timeout
/// summary, since those are the only two shapes a non-streaming caller needs.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
    Final { answer: String, confidence: Confidence, iterations: u32 },
    Timeout { message: String, iterations: u32 },
    Error { message: String, where_: String },
}

/// Collects the event stream internally and returns only the terminal
/// event's payload.
pub async fn ask_sync(agent: Arc<Agent>, question: String, options: TurnOptions) -> AskOutcome {
    let mut rx = ask(agent, question, options);
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::Final { answer, confidence, iterations } => {
                return AskOutcome::Final { answer, confidence, iterations };
            }
            AgentEvent::Timeout { message, iterations } => {
                return AskOutcome::Timeout { message, iterations };
            }
            AgentEvent::Error { message, where_ } => {
                return AskOutcome::Error { message, where_ };
            }
            _ => {}
        }
    }
    AskOutcome::Error { message: "agent stream ended without a terminal event".into(), where_: "orchestrator".into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_oracle::OracleAdapter;
    use forge_sandbox::SandboxExecutor;
    use forge_store::ToolStore;

    fn agent() -> Arc<Agent> {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::open(dir.path().join("tools.jsonl")).unwrap();
        let sandbox = SandboxExecutor::new(store.clone(), Default::default());
        let mut oracle_cfg = forge_domain::config::OracleConfig::default();
        oracle_cfg.credentials.push(forge_domain::config::CredentialConfig {
            id: "primary".into(),
            base_url: "https://api.example.com/v1".into(),
            model: None,
            auth: forge_domain::config::AuthMode::ApiKey { key: "test-key".into() },
        });
        let oracle = OracleAdapter::from_config(&oracle_cfg).unwrap();
        Arc::new(Agent {
            store,
            sandbox,
            oracle,
            // iter_max 0 forces the budget-exhausted path before any oracle call.
            limits: forge_domain::config::AgentConfig { iter_max: 0, t_max_secs: 5, bug_threshold: 3 },
            search: Default::default(),
        })
    }

    #[tokio::test]
    async fn ask_sync_reports_iteration_budget_exhaustion_without_any_oracle_call() {
        let outcome = ask_sync(agent(), "what is 2+2?".into(), TurnOptions::default()).await;
        assert!(matches!(outcome, AskOutcome::Final { .. }));
    }
}
