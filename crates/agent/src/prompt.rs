//! Builds the oracle prompt for one iteration from the scratchpad and the
//! current candidate-tool catalog, and the JSON schema the decision must
//! conform to.

use forge_domain::{AgentState, Scratchpad};
use forge_store::Hit;
use serde_json::{json, Value};

pub fn decision_schema() -> Value {
    json!({
        "required": ["state", "reasoning"],
        "properties": {
            "state": {
                "type": "string",
                "enum": ["respond", "fetch_tool", "use_tool", "analyze_tools_for_composite", "create_tool", "exit_response"],
            },
            "reasoning": {"type": "string"},
            "action": {"type": "object"},
        }
    })
}

/// Renders the question, history, prior iterations and candidate catalog
/// into one prompt. Kept as plain text (not a templating engine) since the
/// oracle only needs a coherent block of context, not a layout. `retry_hint`
/// carries a note about why the previous response was rejected, used for
/// the single re-prompt after an illegal transition.
pub fn build_prompt(scratchpad: &Scratchpad, current_state: AgentState, candidates: &[Hit], retry_hint: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("You are the reasoning step of a tool-using agent. ");
    out.push_str("Respond with a single JSON object: {\"state\": <next state>, \"reasoning\": <string>, \"action\": <object, required unless state is exit_response>}.\n\n");
    out.push_str(&format!("Question: {}\n", scratchpad.question));

    if !scratchpad.history.is_empty() {
        out.push_str("\nConversation history:\n");
        for (role, content) in &scratchpad.history {
            out.push_str(&format!("- {role}: {content}\n"));
        }
    }

    if !scratchpad.iterations.is_empty() {
        out.push_str("\nPrior iterations this turn:\n");
        for it in &scratchpad.iterations {
            out.push_str(&format!(
                "- iteration {}: state={:?} reasoning=\"{}\" action={:?} result={:?}\n",
                it.number, it.state, it.reasoning, it.action, it.result
            ));
        }
    }

    if !candidates.is_empty() {
        out.push_str("\nCandidate tools discovered so far:\n");
        for c in candidates {
            out.push_str(&format!("- {} (score {:.2})\n", c.name, c.score));
        }
    }

    out.push_str(&format!("\nCurrent state: {current_state:?}\n"));
    out.push_str("Allowed next states from here: ");
    out.push_str(
        &current_state
            .allowed_next()
            .iter()
            .map(|s| format!("{s:?}"))
            .collect::<Vec<_>>()
            .join(", "),
    );
    out.push('\n');

    if let Some(hint) = retry_hint {
        out.push_str(&format!("\n{hint}\n"));
    }

    out
}
