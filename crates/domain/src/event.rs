//! Per-question event stream types emitted by the reasoning agent and
//! forwarded in order by the streaming orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fsm::AgentState;

/// Confidence attached to a `final` event, downgraded whenever any iteration
/// in the trace ended in a non-`Ok` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// One action requested for the current iteration. The shape mirrors the
/// per-state action payloads in the streaming contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    FetchTool { query: String, limit: Option<usize> },
    UseTool { tool: String, args: Value },
    AnalyzeToolsForComposite { candidates: Vec<String> },
    CreateTool { spec: Value },
}

/// The outcome of executing an iteration's action, attached to the `result`
/// event. `Ok` carries the raw JSON value; `Err` carries a domain error kind
/// and message so the next oracle prompt can react to it without needing the
/// caller to parse exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    Ok { value: Value },
    Err { error_kind: String, message: String },
}

impl ActionResult {
    pub fn is_err(&self) -> bool {
        matches!(self, ActionResult::Err { .. })
    }
}

/// One event in the per-question stream. `iteration` is `None` only for
/// `Start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    Start { question: String },
    Iteration { number: u32 },
    Thinking { message: String },
    State { state: AgentState, reasoning: String },
    Action { action: Action },
    Result { state: AgentState, result: ActionResult },
    Final { answer: String, confidence: Confidence, iterations: u32 },
    Timeout { message: String, iterations: u32 },
    Error { message: String, where_: String },
}

/// A single iteration recorded on the scratchpad, used to build the next
/// oracle prompt and, after the fact, to reconstruct the trace for tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub number: u32,
    pub state: AgentState,
    pub reasoning: String,
    pub action: Option<Action>,
    pub result: Option<ActionResult>,
}

/// The agent's working memory for one question. Transient: never persisted
/// beyond the lifetime of the request that produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scratchpad {
    pub question: String,
    pub history: Vec<(String, String)>,
    pub iterations: Vec<IterationRecord>,
}

impl Scratchpad {
    pub fn new(question: impl Into<String>, history: Vec<(String, String)>) -> Self {
        Scratchpad { question: question.into(), history, iterations: Vec::new() }
    }

    pub fn current_iteration(&self) -> u32 {
        self.iterations.len() as u32
    }

    /// True once any recorded iteration in this question ended in an error.
    pub fn any_failure(&self) -> bool {
        self.iterations.iter().any(|it| matches!(&it.result, Some(r) if r.is_err()))
    }

    /// True once a `fetch_tool` iteration returned at least one candidate
    /// above threshold — used to enforce reuse-before-generate.
    pub fn has_relevant_fetch(&self) -> bool {
        self.iterations.iter().any(|it| {
            matches!(it.action, Some(Action::FetchTool { .. }))
                && matches!(&it.result, Some(ActionResult::Ok { value }) if value
                    .as_array()
                    .map(|a| !a.is_empty())
                    .unwrap_or(false))
        })
    }

    /// True once reuse has been attempted this question (a `use_tool` or
    /// `analyze_tools_for_composite` iteration occurred) — required before
    /// `create_tool` is allowed when a relevant fetch exists.
    pub fn has_attempted_reuse(&self) -> bool {
        self.iterations.iter().any(|it| {
            matches!(it.action, Some(Action::UseTool { .. }) | Some(Action::AnalyzeToolsForComposite { .. }))
        })
    }
}
