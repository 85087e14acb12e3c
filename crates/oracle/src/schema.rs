//! A minimal JSON-schema-shaped validator for oracle responses.
//!
//! Only the subset the agent actually needs: `required` fields, declared
//! `properties` with a `type` and optional `enum`. Good enough to reject a
//! malformed oracle response before it reaches the agent's state machine,
//! without pulling in a general-purpose schema crate for five checks.

use serde_json::Value;

pub fn validate(value: &Value, schema: &Value) -> Result<(), String> {
    let obj = value.as_object().ok_or("expected a JSON object")?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required {
            let name = field.as_str().unwrap_or_default();
            if !obj.contains_key(name) {
                return Err(format!("missing required field '{name}'"));
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (name, prop_schema) in props {
            let Some(actual) = obj.get(name) else { continue };
            if let Some(expected_type) = prop_schema.get("type").and_then(Value::as_str) {
                if !type_matches(actual, expected_type) {
                    return Err(format!("field '{name}' has wrong type, expected {expected_type}"));
                }
            }
            if let Some(allowed) = prop_schema.get("enum").and_then(Value::as_array) {
                if !allowed.iter().any(|v| v == actual) {
                    return Err(format!("field '{name}' has value not in enum: {actual}"));
                }
            }
        }
    }

    Ok(())
}

fn type_matches(v: &Value, expected: &str) -> bool {
    match expected {
        "string" => v.is_string(),
        "number" => v.is_number(),
        "boolean" => v.is_boolean(),
        "object" => v.is_object(),
        "array" => v.is_array(),
        "null" => v.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decision_schema() -> Value {
        json!({
            "required": ["state", "reasoning"],
            "properties": {
                "state": {"type": "string", "enum": ["respond", "fetch_tool", "use_tool", "create_tool", "exit_response"]},
                "reasoning": {"type": "string"},
                "action": {"type": "object"},
            }
        })
    }

    #[test]
    fn accepts_well_formed_response() {
        let v = json!({"state": "respond", "reasoning": "thinking"});
        assert!(validate(&v, &decision_schema()).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let v = json!({"state": "respond"});
        assert!(validate(&v, &decision_schema()).is_err());
    }

    #[test]
    fn rejects_value_outside_enum() {
        let v = json!({"state": "not_a_real_state", "reasoning": "x"});
        assert!(validate(&v, &decision_schema()).is_err());
    }

    #[test]
    fn rejects_wrong_type() {
        let v = json!({"state": 5, "reasoning": "x"});
        assert!(validate(&v, &decision_schema()).is_err());
    }

    #[test]
    fn ignores_undeclared_extra_fields() {
        let v = json!({"state": "respond", "reasoning": "x", "extra": 1});
        assert!(validate(&v, &decision_schema()).is_ok());
    }
}
