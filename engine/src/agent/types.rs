//! Agent data types
//!
//! Plans and actions are a closed tagged variant dispatched by exhaustive
//! matching; backend output is validated into these shapes at the boundary
//! and ad hoc structures never reach the executor. A plan is never mutated
//! after creation — a loop-back builds a new plan.

use sdk::profile::Attribute;
use sdk::scheme::{EligibilityResult, RetrievalHit};
use serde::Deserialize;
use std::fmt;

/// One step the executor can take
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Evaluate the profile against the scheme catalog
    RunEligibility,

    /// Query the retrieval service
    RunRetrieval { query: String },

    /// Ask the user for one missing attribute
    AskClarification { attribute: Attribute },

    /// Deliver the final answer
    RespondFinal,
}

impl Action {
    /// Stable label used in logs and failure records
    pub fn label(&self) -> &'static str {
        match self {
            Action::RunEligibility => "run_eligibility_engine",
            Action::RunRetrieval { .. } => "run_scheme_retrieval",
            Action::AskClarification { .. } => "ask_clarification",
            Action::RespondFinal => "respond_final",
        }
    }

    /// Whether this action invokes a tool (as opposed to talking to the user)
    pub fn is_tool(&self) -> bool {
        matches!(self, Action::RunEligibility | Action::RunRetrieval { .. })
    }
}

/// Ordered sequence of actions for one turn
///
/// Interactive actions (clarification, final response) are never combined
/// with tool actions in the same plan; the constructors below are the only
/// way plans are built.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: String,
    pub intent: String,
    pub actions: Vec<Action>,
    pub created_turn: u32,
}

impl Plan {
    fn new(intent: impl Into<String>, actions: Vec<Action>, created_turn: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            intent: intent.into(),
            actions,
            created_turn,
        }
    }

    /// Eligibility evaluation plus retrieval, run concurrently
    pub fn eligibility_first(
        intent: impl Into<String>,
        query: impl Into<String>,
        created_turn: u32,
    ) -> Self {
        Self::new(
            intent,
            vec![
                Action::RunEligibility,
                Action::RunRetrieval {
                    query: query.into(),
                },
            ],
            created_turn,
        )
    }

    /// Retrieval only, for sparse profiles and free-text intents
    pub fn retrieval_only(
        intent: impl Into<String>,
        query: impl Into<String>,
        created_turn: u32,
    ) -> Self {
        Self::new(
            intent,
            vec![Action::RunRetrieval {
                query: query.into(),
            }],
            created_turn,
        )
    }

    /// Ask the user for one missing attribute; no tools run
    pub fn clarification(intent: impl Into<String>, attribute: Attribute, created_turn: u32) -> Self {
        Self::new(intent, vec![Action::AskClarification { attribute }], created_turn)
    }

    /// The attribute to clarify, when this is a clarification plan
    pub fn clarification_attribute(&self) -> Option<Attribute> {
        match self.actions.as_slice() {
            [Action::AskClarification { attribute }] => Some(*attribute),
            _ => None,
        }
    }

    /// Whether every action in the plan is a tool action
    pub fn is_tool_plan(&self) -> bool {
        !self.actions.is_empty() && self.actions.iter().all(Action::is_tool)
    }
}

/// Planner output: a plan, or a signal that the input was unintelligible
#[derive(Debug)]
pub enum PlannerOutcome {
    Plan(Plan),
    Unintelligible,
}

/// Boundary schema for the backend's intent classification.
///
/// Anything that fails to deserialize into this shape is treated as a
/// malformed response, never passed onward.
#[derive(Debug, Deserialize)]
pub struct RawIntent {
    pub intent: String,

    #[serde(default)]
    pub unintelligible: bool,

    #[serde(default)]
    pub search_query: Option<String>,
}

/// A recorded per-action failure; logged, non-fatal, execution continues
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub action: &'static str,
    pub reason: String,
}

/// Aggregated results of executing one plan, keyed by action identity.
///
/// Parallel actions complete in no particular order; aggregation by identity
/// makes ordering irrelevant.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub eligibility: Option<Vec<EligibilityResult>>,
    pub retrieval: Option<Vec<RetrievalHit>>,
    pub failures: Vec<ToolFailure>,
}

impl ExecutionReport {
    /// Labels of the tools that produced a result
    pub fn tools_used(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.eligibility.is_some() {
            out.push("run_eligibility_engine");
        }
        if self.retrieval.is_some() {
            out.push("run_scheme_retrieval");
        }
        out
    }
}

/// Evaluator verdict for one execution round
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Enough information to answer
    Complete { reason: String },

    /// Loop back for more information, targeting the given attributes
    NeedMoreInfo {
        missing: Vec<Attribute>,
        reason: String,
    },
}

/// States of the per-session orchestration machine.
///
/// There is no terminal state: after `Responding` the machine returns to
/// `Listening` for the next turn of the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Listening,
    Planning,
    Executing,
    Evaluating,
    Responding,
}

impl AgentState {
    /// Explicit transition table.
    ///
    /// `Planning -> Responding` covers unintelligible input, clarification
    /// plans, and high-severity contradictions (no tools run). The loop-back
    /// path is `Evaluating -> Planning`: a fresh plan is required, the
    /// machine never re-enters `Executing` directly.
    pub fn can_transition(self, to: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, to),
            (Listening, Planning)
                | (Planning, Executing)
                | (Planning, Responding)
                | (Executing, Evaluating)
                | (Evaluating, Planning)
                | (Evaluating, Responding)
                | (Responding, Listening)
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Listening => "listening",
            AgentState::Planning => "planning",
            AgentState::Executing => "executing",
            AgentState::Evaluating => "evaluating",
            AgentState::Responding => "responding",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_constructors_keep_interactive_actions_alone() {
        let tools = Plan::eligibility_first("find schemes", "pension", 0);
        assert!(tools.is_tool_plan());
        assert_eq!(tools.actions.len(), 2);
        assert!(tools.clarification_attribute().is_none());

        let ask = Plan::clarification("find schemes", Attribute::IsBpl, 0);
        assert!(!ask.is_tool_plan());
        assert_eq!(ask.clarification_attribute(), Some(Attribute::IsBpl));
        assert_eq!(ask.actions.len(), 1);
    }

    #[test]
    fn test_raw_intent_boundary_validation() {
        let raw: RawIntent =
            serde_json::from_str(r#"{"intent": "wants a pension", "search_query": "pension"}"#)
                .unwrap();
        assert!(!raw.unintelligible);
        assert_eq!(raw.search_query.as_deref(), Some("pension"));

        // Missing required field fails validation
        assert!(serde_json::from_str::<RawIntent>(r#"{"unintelligible": true}"#).is_err());
    }

    #[test]
    fn test_transition_table_legal_paths() {
        use AgentState::*;
        assert!(Listening.can_transition(Planning));
        assert!(Planning.can_transition(Executing));
        assert!(Planning.can_transition(Responding));
        assert!(Executing.can_transition(Evaluating));
        assert!(Evaluating.can_transition(Planning));
        assert!(Evaluating.can_transition(Responding));
        assert!(Responding.can_transition(Listening));
    }

    #[test]
    fn test_transition_table_illegal_paths() {
        use AgentState::*;
        // Loop-back must go through planning, never straight to executing
        assert!(!Evaluating.can_transition(Executing));
        assert!(!Listening.can_transition(Executing));
        assert!(!Executing.can_transition(Responding));
        assert!(!Responding.can_transition(Planning));
        assert!(!Planning.can_transition(Planning));
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(Action::RunEligibility.label(), "run_eligibility_engine");
        assert_eq!(
            Action::RunRetrieval {
                query: "x".into()
            }
            .label(),
            "run_scheme_retrieval"
        );
        assert!(!Action::RespondFinal.is_tool());
    }
}
