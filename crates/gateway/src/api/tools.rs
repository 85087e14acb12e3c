//! The tool-store REST surface: list/get/create/update/delete/execute/
//! search/clear-bugs/deactivate/bugged-list.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use forge_domain::tool::{ToolPatch, ToolSpec};
use forge_domain::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::AppState;

fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::NameConflict(_) => StatusCode::CONFLICT,
        Error::Validation(_) | Error::BadArguments(_) => StatusCode::BAD_REQUEST,
        Error::ToolBugged | Error::Inactive => StatusCode::CONFLICT,
        Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
        Error::ResourceDenied(_) => StatusCode::FORBIDDEN,
        Error::CompileError(_) | Error::RuntimeError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::BadOracleResponse(_) | Error::OracleUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Storage(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn to_response<T: serde::Serialize>(result: Result<T>) -> axum::response::Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(json!(value))).into_response(),
        Err(e) => (error_status(&e), Json(json!({"kind": e.kind(), "message": e.to_string()}))).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_true")]
    pub active_only: bool,
    #[serde(default = "default_true")]
    pub exclude_bugged: bool,
    pub category: Option<String>,
}

fn default_true() -> bool {
    true
}

pub async fn list(State(state): State<AppState>, Query(q): Query<ListQuery>) -> impl IntoResponse {
    let tools = state.store.list(q.active_only, q.exclude_bugged, q.category.as_deref());
    Json(tools)
}

pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    to_response(state.store.get_by_id(id))
}

pub async fn get_by_name(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    to_response(state.store.get_by_name(&name))
}

pub async fn create(State(state): State<AppState>, Json(spec): Json<ToolSpec>) -> impl IntoResponse {
    to_response(state.store.create(spec))
}

pub async fn update(State(state): State<AppState>, Path(id): Path<Uuid>, Json(patch): Json<ToolPatch>) -> impl IntoResponse {
    to_response(state.store.update(id, patch))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.store.delete(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (error_status(&e), Json(json!({"kind": e.kind(), "message": e.to_string()}))).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub args: Value,
}

pub async fn execute(State(state): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<ExecuteRequest>) -> impl IntoResponse {
    match state.sandbox().execute(&id.to_string(), req.args).await {
        Ok((value, telemetry)) => {
            (StatusCode::OK, Json(json!({"value": value, "elapsed_ms": telemetry.elapsed.as_millis()}))).into_response()
        }
        Err(e) => (error_status(&e), Json(json!({"kind": e.kind(), "message": e.to_string()}))).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub threshold: Option<f64>,
    #[serde(default = "default_true")]
    pub exclude_bugged: bool,
}

fn default_limit() -> usize {
    10
}

pub async fn search(State(state): State<AppState>, Path(query): Path<String>, Query(q): Query<SearchQuery>) -> impl IntoResponse {
    let mut cfg = state.config.search.clone();
    if let Some(t) = q.threshold {
        cfg.threshold = t;
    }
    let hits = state.store.search(&query, q.limit, &cfg, q.exclude_bugged);
    Json(hits.into_iter().map(|h| json!({"id": h.id, "name": h.name, "score": h.score})).collect::<Vec<_>>())
}

pub async fn clear_bugs(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    to_response(state.store.clear_bugs(id))
}

pub async fn deactivate(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    to_response(state.store.deactivate(id))
}

pub async fn bugged_list(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.bugged())
}
