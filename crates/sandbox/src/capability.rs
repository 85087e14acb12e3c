//! Capability registration and argument validation for the sandbox.
//!
//! Only the modules named in [`SandboxConfig::allowed_imports`] are wired
//! into the engine; everything else (filesystem, process environment,
//! arbitrary network) is simply never registered, so there is nothing for
//! tool code to call into even if it tried.

use std::sync::Arc;

use forge_domain::{tool::ParameterSpec, tool::ParameterType, Error, Result};
use rhai::{Dynamic, Engine};
use serde_json::Value;

use crate::ChainState;

pub fn validate_args(params: &[ParameterSpec], args: &Value) -> Result<()> {
    let obj = args
        .as_object()
        .ok_or_else(|| Error::BadArguments("arguments must be a JSON object".into()))?;

    for p in params {
        match obj.get(&p.name) {
            None if p.required => {
                return Err(Error::BadArguments(format!("missing required argument '{}'", p.name)));
            }
            None => {}
            Some(v) => {
                if !matches_type(v, p.kind) {
                    return Err(Error::BadArguments(format!(
                        "argument '{}' does not match declared type {:?}",
                        p.name, p.kind
                    )));
                }
            }
        }
    }
    Ok(())
}

fn matches_type(v: &Value, kind: ParameterType) -> bool {
    match kind {
        ParameterType::String => v.is_string(),
        ParameterType::Number => v.is_number() || v.as_str().map(|s| s.parse::<f64>().is_ok()).unwrap_or(false),
        ParameterType::Boolean => v.is_boolean(),
        ParameterType::Object => v.is_object(),
        ParameterType::Array => v.is_array(),
    }
}

/// Wires the configured capability surface and the `execute_tool` chaining
/// helper into `engine`.
pub fn install(engine: &mut Engine, chain: &ChainState) {
    let allowed: std::collections::HashSet<&str> = chain.config.allowed_imports.iter().map(|s| s.as_str()).collect();

    if allowed.contains("math") {
        engine.register_fn("clamp", |v: f64, lo: f64, hi: f64| v.max(lo).min(hi));
    }
    if allowed.contains("json") {
        engine.register_fn("to_json", |d: Dynamic| -> String {
            serde_json::to_string(&d).unwrap_or_default()
        });
    }
    if allowed.contains("datetime") {
        engine.register_fn("now_rfc3339", || chrono::Utc::now().to_rfc3339());
    }

    let chain = Arc::new(chain.clone());
    engine.register_fn("execute_tool", move |name: &str, args: rhai::Map| -> std::result::Result<Dynamic, Box<rhai::EvalAltResult>> {
        execute_tool_sync(&chain, name, args).map_err(|e| e.to_string().into())
    });
}

fn execute_tool_sync(chain: &ChainState, name: &str, args: rhai::Map) -> Result<Dynamic> {
    if chain.visited.len() as u32 >= chain.config.max_chain_depth {
        return Err(Error::RuntimeError("cycle: max tool chain depth exceeded".into()));
    }
    if chain.visited.iter().any(|v| v == name) {
        return Err(Error::RuntimeError(format!("cycle: '{name}' already in call chain")));
    }

    let tool = chain.store.resolve(name)?;
    if tool.is_bugged {
        return Err(Error::ToolBugged);
    }
    if !tool.is_active {
        return Err(Error::Inactive);
    }

    let mut next_chain = chain.clone();
    next_chain.visited.push(tool.name.clone());

    let mut next_engine = Engine::new();
    next_engine.set_max_operations(5_000_000);
    next_engine.set_max_call_levels(64);
    install(&mut next_engine, &next_chain);

    let ast = next_engine.compile(&tool.code).map_err(|e| Error::CompileError(e.to_string()))?;
    let mut scope = rhai::Scope::new();
    next_engine
        .call_fn(&mut scope, &ast, "run", (args,))
        .map_err(|e| Error::RuntimeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_domain::tool::ParameterSpec;
    use serde_json::json;

    fn param(name: &str, kind: ParameterType, required: bool) -> ParameterSpec {
        ParameterSpec { name: name.into(), kind, required, description: String::new() }
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let params = vec![param("a", ParameterType::Number, true)];
        let err = validate_args(&params, &json!({})).unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)));
    }

    #[test]
    fn optional_argument_may_be_absent() {
        let params = vec![param("a", ParameterType::Number, false)];
        assert!(validate_args(&params, &json!({})).is_ok());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let params = vec![param("a", ParameterType::Number, true)];
        let err = validate_args(&params, &json!({"a": "not a number"})).unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)));
    }

    #[test]
    fn numeric_string_coerces_for_number_type() {
        let params = vec![param("a", ParameterType::Number, true)];
        assert!(validate_args(&params, &json!({"a": "42"})).is_ok());
    }
}
