//! Sandboxed execution of tool code.
//!
//! Tool code is Rhai source defining a `run` function; each call gets a
//! fresh [`rhai::Engine`]/[`rhai::Scope`] pair with only the configured
//! capability modules registered and an operation-count ceiling as a
//! cooperative timeout backstop, plus a wall-clock deadline enforced by
//! running the call on a blocking thread with [`tokio::time::timeout`].
//! `execute_tool` lets a tool's script call another tool by name, resolved
//! through the store, bounded to `max_chain_depth` with cycle detection.

mod capability;

use std::sync::Arc;
use std::time::Duration;

use forge_domain::config::SandboxConfig;
use forge_domain::tool::{ParameterSpec, ParameterType};
use forge_domain::{Error, Result};
use forge_store::ToolStore;
use rhai::{Dynamic, Engine, Scope};
use serde_json::Value;

/// Telemetry returned alongside a successful execution.
#[derive(Debug, Clone)]
pub struct ExecutionTelemetry {
    pub elapsed: Duration,
}

/// Recursion guard passed down through nested `execute_tool` calls.
#[derive(Clone)]
struct ChainState {
    store: ToolStore,
    config: SandboxConfig,
    visited: Vec<String>,
}

/// Evaluates tool code against arguments, with the capability policy and
/// chain-depth limits from `config`.
pub struct SandboxExecutor {
    store: ToolStore,
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(store: ToolStore, config: SandboxConfig) -> Self {
        SandboxExecutor { store, config }
    }

    /// Runs `tool_id_or_name`'s code with `args`, honoring bugged/inactive
    /// guards, argument validation, and the configured execution timeout.
    pub async fn execute(&self, id_or_name: &str, args: Value) -> Result<(Value, ExecutionTelemetry)> {
        let tool = self.store.resolve(id_or_name)?;
        if tool.is_bugged {
            return Err(Error::ToolBugged);
        }
        if !tool.is_active {
            return Err(Error::Inactive);
        }
        capability::validate_args(&tool.parameters, &args)?;

        let chain = ChainState { store: self.store.clone(), config: self.config.clone(), visited: vec![tool.name.clone()] };
        let code = tool.code.clone();
        let params = tool.parameters.clone();
        let t_exec = Duration::from_secs(self.config.t_exec_secs.max(1));

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(t_exec, run_blocking(code, args, params, chain)).await;

        let value = match result {
            Ok(inner) => inner?,
            Err(_) => return Err(Error::Timeout),
        };
        let elapsed = start.elapsed();

        self.store.record_execution(tool.id)?;
        Ok((value, ExecutionTelemetry { elapsed }))
    }
}

async fn run_blocking(code: String, args: Value, params: Vec<ParameterSpec>, chain: ChainState) -> Result<Value> {
    tokio::task::spawn_blocking(move || eval(&code, args, &params, chain))
        .await
        .map_err(|e| Error::Internal(format!("sandbox task panicked: {e}")))?
}

fn eval(code: &str, args: Value, params: &[ParameterSpec], chain: ChainState) -> Result<Value> {
    let mut engine = Engine::new();
    engine.set_max_operations(5_000_000);
    engine.set_max_call_levels(64);
    capability::install(&mut engine, &chain);

    let ast = engine
        .compile(code)
        .map_err(|e| Error::CompileError(e.to_string()))?;

    let mut scope = Scope::new();
    let arg_map = json_to_rhai_map(&args, params)?;

    let result: Dynamic = engine
        .call_fn(&mut scope, &ast, "run", (arg_map,))
        .map_err(|e| Error::RuntimeError(e.to_string()))?;

    rhai_to_json(result)
}

/// Builds the Rhai argument map from JSON args, coercing numeric strings to
/// numbers for parameters declared `ParameterType::Number` — `validate_args`
/// accepts those strings, so this is the step that actually makes `run` see
/// a number rather than a string it would otherwise have to concatenate.
fn json_to_rhai_map(args: &Value, params: &[ParameterSpec]) -> Result<rhai::Map> {
    let obj = args
        .as_object()
        .ok_or_else(|| Error::BadArguments("arguments must be a JSON object".into()))?;
    let mut map = rhai::Map::new();
    for (k, v) in obj {
        let declared_number = params.iter().any(|p| p.name == *k && p.kind == ParameterType::Number);
        let v = if declared_number { coerce_numeric_string(v) } else { v.clone() };
        map.insert(k.as_str().into(), json_to_dynamic(&v));
    }
    Ok(map)
}

/// Parses a JSON string into a JSON number, preferring an integer
/// representation when the string round-trips as one. Non-string or
/// unparseable values pass through unchanged.
fn coerce_numeric_string(v: &Value) -> Value {
    let Value::String(s) = v else { return v.clone() };
    if let Ok(i) = s.parse::<i64>() {
        Value::Number(i.into())
    } else if let Ok(f) = s.parse::<f64>() {
        serde_json::Number::from_f64(f).map(Value::Number).unwrap_or_else(|| v.clone())
    } else {
        v.clone()
    }
}

fn json_to_dynamic(v: &Value) -> Dynamic {
    match v {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else {
                Dynamic::from(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(a) => Dynamic::from(a.iter().map(json_to_dynamic).collect::<rhai::Array>()),
        Value::Object(o) => {
            let mut map = rhai::Map::new();
            for (k, v) in o {
                map.insert(k.as_str().into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

fn rhai_to_json(d: Dynamic) -> Result<Value> {
    serde_json::to_value(&d).map_err(|e| Error::RuntimeError(format!("return value is not JSON-representable: {e}")))
}
