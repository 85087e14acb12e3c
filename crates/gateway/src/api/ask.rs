//! `/ask` (collected) and `/ask/stream` (SSE) handlers, both backed by the
//! same [`crate::orchestrator`] entry points.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::{http::StatusCode, Json};
use forge_agent::TurnOptions;
use forge_domain::AgentEvent;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::orchestrator::{ask, ask_sync, AskOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskOptions {
    pub iter_max: Option<u32>,
    pub t_max_secs: Option<u64>,
    #[serde(default)]
    pub history: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub options: Option<AskOptions>,
}

fn turn_options(options: Option<AskOptions>) -> TurnOptions {
    let options = options.unwrap_or(AskOptions { iter_max: None, t_max_secs: None, history: vec![] });
    TurnOptions {
        iter_max: options.iter_max,
        t_max: options.t_max_secs.map(Duration::from_secs),
        history: options.history,
    }
}

pub async fn ask_endpoint(State(state): State<AppState>, Json(req): Json<AskRequest>) -> impl IntoResponse {
    let outcome = ask_sync(state.agent.clone(), req.question, turn_options(req.options)).await;
    match &outcome {
        AskOutcome::Final { .. } => (StatusCode::OK, Json(outcome)).into_response(),
        AskOutcome::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, Json(outcome)).into_response(),
        AskOutcome::Error { .. } => (StatusCode::UNPROCESSABLE_ENTITY, Json(outcome)).into_response(),
    }
}

pub async fn ask_stream_endpoint(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = ask(state.agent.clone(), req.question, turn_options(req.options));
    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|event| Ok(to_sse_event(&event)));
    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default())
}

fn to_sse_event(event: &AgentEvent) -> Event {
    let (kind, payload) = match event {
        AgentEvent::Start { question } => ("start", json!({"question": question})),
        AgentEvent::Iteration { number } => ("iteration", json!({"number": number})),
        AgentEvent::Thinking { message } => ("thinking", json!({"message": message})),
        AgentEvent::State { state, reasoning } => ("state", json!({"state": state, "reasoning": reasoning})),
        AgentEvent::Action { action } => ("action", json!({"action": action})),
        AgentEvent::Result { state, result } => ("result", json!({"state": state, "result": result})),
        AgentEvent::Final { answer, confidence, iterations } => {
            ("final", json!({"answer": answer, "confidence": confidence, "iterations": iterations}))
        }
        AgentEvent::Timeout { message, iterations } => ("timeout", json!({"message": message, "iterations": iterations})),
        AgentEvent::Error { message, where_ } => ("error", json!({"message": message, "where": where_})),
    };
    Event::default().event(kind).data(payload.to_string())
}
