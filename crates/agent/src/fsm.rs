//! The reasoning agent's turn loop.
//!
//! One call to [`Agent::run_turn`] answers one question: it drives the
//! oracle for the next state decision, executes that state's side effect
//! against the tool store and sandbox, and emits events on `tx` in strict
//! order until a terminal state, the iteration cap, or the wall-clock cap
//! is reached. A dropped receiver (consumer disconnect) stops the loop
//! without emitting further events — the cancellation path.

use std::time::{Duration, Instant};

use forge_domain::config::{AgentConfig as AgentLimits, SearchConfig};
use forge_domain::tool::ToolSpec;
use forge_domain::{Action, ActionResult, AgentEvent, AgentState, Confidence, Error, IterationRecord, Scratchpad};
use forge_oracle::OracleAdapter;
use forge_sandbox::SandboxExecutor;
use forge_store::{Hit, ToolStore};
use serde_json::Value;
use tokio::sync::mpsc::Sender;

use crate::prompt::{build_prompt, decision_schema};

pub struct Agent {
    pub store: ToolStore,
    pub sandbox: SandboxExecutor,
    pub oracle: OracleAdapter,
    pub limits: AgentLimits,
    pub search: SearchConfig,
}

/// Options that override the configured defaults for a single turn.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    pub iter_max: Option<u32>,
    pub t_max: Option<Duration>,
    pub history: Vec<(String, String)>,
}

/// Returned from the emit-or-stop macro: `true` means "continue", `false`
/// means the receiver disappeared and the loop should stop silently.
macro_rules! emit {
    ($tx:expr, $event:expr) => {
        if $tx.send($event).await.is_err() {
            return;
        }
    };
}

impl Agent {
    pub async fn run_turn(&self, question: String, options: TurnOptions, tx: Sender<AgentEvent>) {
        let iter_max = options.iter_max.unwrap_or(self.limits.iter_max);
        let t_max = options.t_max.unwrap_or(Duration::from_secs(self.limits.t_max_secs));
        let deadline = Instant::now() + t_max;

        emit!(tx, AgentEvent::Start { question: question.clone() });

        let mut scratchpad = Scratchpad::new(question, options.history);
        let mut state = AgentState::Respond;
        let mut candidates: Vec<Hit> = Vec::new();
        let mut rename_retried = false;

        loop {
            if Instant::now() >= deadline {
                emit!(tx, AgentEvent::Timeout { message: "wall-clock budget exceeded".into(), iterations: scratchpad.current_iteration() });
                return;
            }
            if scratchpad.current_iteration() >= iter_max {
                let confidence = if scratchpad.any_failure() { Confidence::Low } else { Confidence::Medium };
                emit!(
                    tx,
                    AgentEvent::Final {
                        answer: "iteration budget exhausted before a final answer was reached".into(),
                        confidence,
                        iterations: scratchpad.current_iteration(),
                    }
                );
                return;
            }

            let number = scratchpad.current_iteration() + 1;
            emit!(tx, AgentEvent::Iteration { number });

            // On an illegal transition, re-prompt once with a hint before forcing `error`.
            let mut retry_hint: Option<String> = None;
            let (next_state, reasoning, action_value) = loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let prompt = build_prompt(&scratchpad, state, &candidates, retry_hint.as_deref());
                let decision = match tokio::time::timeout(remaining, self.oracle.decide(&prompt, &decision_schema())).await {
                    Ok(Ok(v)) => v,
                    Ok(Err(e)) => {
                        emit!(tx, AgentEvent::Error { message: e.to_string(), where_: "oracle".into() });
                        return;
                    }
                    Err(_) => {
                        emit!(tx, AgentEvent::Timeout { message: "oracle call exceeded remaining turn budget".into(), iterations: scratchpad.current_iteration() });
                        return;
                    }
                };

                let (candidate_state, reasoning, action_value) = match parse_decision(&decision) {
                    Ok(parts) => parts,
                    Err(msg) => {
                        emit!(tx, AgentEvent::Error { message: msg, where_: "oracle_response".into() });
                        return;
                    }
                };

                if state.can_transition_to(candidate_state) {
                    break (candidate_state, reasoning, action_value);
                }
                if retry_hint.is_some() {
                    emit!(
                        tx,
                        AgentEvent::Error {
                            message: format!("illegal transition {state:?} -> {candidate_state:?}"),
                            where_: "fsm".into(),
                        }
                    );
                    return;
                }
                retry_hint = Some(format!(
                    "Your previous response proposed transitioning to {candidate_state:?}, which is not allowed from {state:?}. Choose one of the allowed next states listed above."
                ));
            };

            if next_state == AgentState::CreateTool && !self.create_tool_allowed(&scratchpad) {
                emit!(tx, AgentEvent::Error { message: "create_tool attempted without exhausting reuse".into(), where_: "fsm".into() });
                return;
            }

            emit!(tx, AgentEvent::State { state: next_state, reasoning: reasoning.clone() });

            let action = action_value.and_then(|v| parse_action(next_state, v));
            if let Some(a) = &action {
                emit!(tx, AgentEvent::Action { action: a.clone() });
            }

            if next_state == AgentState::ExitResponse {
                let answer = reasoning.clone();
                let confidence = if scratchpad.any_failure() { Confidence::Low } else { Confidence::High };
                scratchpad.iterations.push(IterationRecord { number, state: next_state, reasoning, action, result: None });
                emit!(tx, AgentEvent::Final { answer, confidence, iterations: number });
                return;
            }

            let result = match &action {
                Some(Action::FetchTool { query, limit }) => {
                    let limit = limit.unwrap_or(10);
                    let hits = self.store.search(query, limit, &self.search, true);
                    candidates = hits.clone();
                    let value = serde_json::to_value(
                        hits.iter().map(|h| serde_json::json!({"id": h.id, "name": h.name, "score": h.score})).collect::<Vec<_>>(),
                    )
                    .unwrap_or(Value::Array(vec![]));
                    ActionResult::Ok { value }
                }
                Some(Action::UseTool { tool, args }) => match self.sandbox.execute(tool, args.clone()).await {
                    Ok((value, _telemetry)) => ActionResult::Ok { value },
                    Err(e) => {
                        if let Ok(t) = self.store.resolve(tool) {
                            let _ = self.store.report_bug(t.id, e.kind(), &e.to_string(), None, self.limits.bug_threshold);
                        }
                        ActionResult::Err { error_kind: e.kind().to_string(), message: e.to_string() }
                    }
                },
                Some(Action::AnalyzeToolsForComposite { candidates: names }) => {
                    ActionResult::Ok { value: serde_json::json!({"candidates": names}) }
                }
                Some(Action::CreateTool { spec }) => match self.create_tool_from_value(spec.clone(), &mut rename_retried) {
                    Ok(tool) => ActionResult::Ok { value: serde_json::json!({"id": tool.id, "name": tool.name}) },
                    Err(e) => ActionResult::Err { error_kind: e.kind().to_string(), message: e.to_string() },
                },
                None => ActionResult::Ok { value: Value::Null },
            };

            emit!(tx, AgentEvent::Result { state: next_state, result: result.clone() });
            scratchpad.iterations.push(IterationRecord { number, state: next_state, reasoning, action, result: Some(result) });
            state = next_state;
        }
    }

    /// search-before-create: creation is only allowed once a `fetch_tool`
    /// this turn was attempted, and — when that fetch turned up something
    /// relevant — only after reuse (`use_tool` or
    /// `analyze_tools_for_composite`) was attempted too.
    fn create_tool_allowed(&self, scratchpad: &Scratchpad) -> bool {
        let attempted_fetch = scratchpad.iterations.iter().any(|it| matches!(it.action, Some(Action::FetchTool { .. })));
        if !attempted_fetch {
            return false;
        }
        if scratchpad.has_relevant_fetch() && !scratchpad.has_attempted_reuse() {
            return false;
        }
        true
    }

    fn create_tool_from_value(&self, spec_value: Value, rename_retried: &mut bool) -> forge_domain::Result<forge_domain::Tool> {
        let spec: ToolSpec = serde_json::from_value(spec_value).map_err(|e| Error::Validation(e.to_string()))?;
        match self.store.create(spec.clone()) {
            Ok(t) => Ok(t),
            Err(Error::NameConflict(_)) if !*rename_retried => {
                *rename_retried = true;
                let mut renamed = spec;
                renamed.name = format!("{}_2", renamed.name);
                self.store.create(renamed)
            }
            Err(e) => Err(e),
        }
    }
}

fn parse_decision(v: &Value) -> Result<(AgentState, String, Option<Value>), String> {
    let state_str = v.get("state").and_then(Value::as_str).ok_or("missing 'state'")?;
    let state = match state_str {
        "respond" => AgentState::Respond,
        "fetch_tool" => AgentState::FetchTool,
        "use_tool" => AgentState::UseTool,
        "analyze_tools_for_composite" => AgentState::AnalyzeToolsForComposite,
        "create_tool" => AgentState::CreateTool,
        "exit_response" => AgentState::ExitResponse,
        other => return Err(format!("unknown state '{other}'")),
    };
    let reasoning = v.get("reasoning").and_then(Value::as_str).unwrap_or_default().to_string();
    let action = v.get("action").cloned();
    Ok((state, reasoning, action))
}

fn parse_action(state: AgentState, value: Value) -> Option<Action> {
    match state {
        AgentState::FetchTool => Some(Action::FetchTool {
            query: value.get("query")?.as_str()?.to_string(),
            limit: value.get("limit").and_then(Value::as_u64).map(|n| n as usize),
        }),
        AgentState::UseTool => Some(Action::UseTool {
            tool: value.get("tool")?.as_str()?.to_string(),
            args: value.get("args").cloned().unwrap_or(Value::Object(Default::default())),
        }),
        AgentState::AnalyzeToolsForComposite => Some(Action::AnalyzeToolsForComposite {
            candidates: value
                .get("candidates")?
                .as_array()?
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
        }),
        AgentState::CreateTool => Some(Action::CreateTool { spec: value.get("spec")?.clone() }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_decision_rejects_unknown_state() {
        assert!(parse_decision(&json!({"state": "bogus", "reasoning": "x"})).is_err());
    }

    #[test]
    fn parse_decision_extracts_fields() {
        let (state, reasoning, action) = parse_decision(&json!({
            "state": "fetch_tool",
            "reasoning": "looking",
            "action": {"query": "add"}
        }))
        .unwrap();
        assert_eq!(state, AgentState::FetchTool);
        assert_eq!(reasoning, "looking");
        assert!(action.is_some());
    }

    #[test]
    fn parse_action_builds_use_tool_with_default_args() {
        let action = parse_action(AgentState::UseTool, json!({"tool": "add"})).unwrap();
        assert!(matches!(action, Action::UseTool { tool, .. } if tool == "add"));
    }

    #[test]
    fn parse_action_returns_none_for_malformed_fetch() {
        assert!(parse_action(AgentState::FetchTool, json!({})).is_none());
    }
}
