//! The reasoning agent's state enum and its allowed-transition table.
//!
//! The table itself lives here, in domain, rather than in the agent crate,
//! so that both the agent (which enforces it) and the gateway (which may
//! want to validate a recorded trace) share one definition.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Respond,
    FetchTool,
    UseTool,
    AnalyzeToolsForComposite,
    CreateTool,
    ExitResponse,
    Timeout,
    Error,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentState::ExitResponse | AgentState::Timeout | AgentState::Error)
    }

    /// The states this one may transition into, per the FSM table. Terminal
    /// states have no allowed next states.
    pub fn allowed_next(self) -> &'static [AgentState] {
        use AgentState::*;
        match self {
            Respond => &[ExitResponse, FetchTool, CreateTool],
            FetchTool => &[UseTool, AnalyzeToolsForComposite, CreateTool, ExitResponse],
            UseTool => &[Respond, FetchTool, ExitResponse],
            AnalyzeToolsForComposite => &[UseTool, CreateTool, FetchTool],
            CreateTool => &[UseTool, ExitResponse],
            ExitResponse | Timeout | Error => &[],
        }
    }

    pub fn can_transition_to(self, next: AgentState) -> bool {
        self.allowed_next().contains(&next)
    }
}

impl Default for AgentState {
    fn default() -> Self {
        AgentState::Respond
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AgentState::*;

    #[test]
    fn initial_state_is_respond() {
        assert_eq!(AgentState::default(), Respond);
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        assert!(ExitResponse.allowed_next().is_empty());
        assert!(Timeout.allowed_next().is_empty());
        assert!(Error.allowed_next().is_empty());
        assert!(ExitResponse.is_terminal());
    }

    #[test]
    fn respond_cannot_jump_to_use_tool() {
        assert!(!Respond.can_transition_to(UseTool));
    }

    #[test]
    fn fetch_tool_can_reach_all_documented_states() {
        for s in [UseTool, AnalyzeToolsForComposite, CreateTool, ExitResponse] {
            assert!(FetchTool.can_transition_to(s));
        }
    }

    #[test]
    fn create_tool_cannot_loop_back_to_fetch_tool() {
        assert!(!CreateTool.can_transition_to(FetchTool));
    }
}
