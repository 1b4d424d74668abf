//! Substrate communication types
//!
//! These types describe one round-trip between the engine and the agent
//! substrate, independent of any specific provider implementation.

use rootscope_core::{Fact, InvestigationPhase, Relationship, Resource, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Investigation context visible to every agent in the substrate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedState {
    /// Run identifier, unique per investigation
    pub run_id: String,
    /// Phase the engine is currently executing
    pub phase: InvestigationPhase,
    /// Trace identifiers the investigation is anchored on
    #[serde(default)]
    pub trace_ids: Vec<String>,
    /// Resources extracted from traces plus explicit targets
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Edges between resources
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Facts accumulated by earlier phases
    #[serde(default)]
    pub facts: Vec<Fact>,
    /// Free-form description of the reported problem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptom: Option<String>,
}

impl SharedState {
    pub fn new(run_id: impl Into<String>, phase: InvestigationPhase) -> Self {
        Self {
            run_id: run_id.into(),
            phase,
            trace_ids: Vec::new(),
            resources: Vec::new(),
            relationships: Vec::new(),
            facts: Vec::new(),
            symptom: None,
        }
    }
}

/// Remaining allowance handed to the substrate with every call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub remaining_tokens: u64,
    pub remaining_cost: f64,
    pub remaining_handoffs: usize,
    /// Upper bound on tokens generated for this single call
    pub max_response_tokens: u32,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            remaining_tokens: 200_000,
            remaining_cost: 2.0,
            remaining_handoffs: 20,
            max_response_tokens: 4096,
        }
    }
}

/// One request to the substrate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstrateRequest {
    /// Phase-specific instructions
    pub prompt: String,
    pub shared_state: SharedState,
    pub budget: Budget,
}

impl SubstrateRequest {
    pub fn new(prompt: impl Into<String>, shared_state: SharedState, budget: Budget) -> Self {
        Self {
            prompt: prompt.into(),
            shared_state,
            budget,
        }
    }

    pub fn phase(&self) -> InvestigationPhase {
        self.shared_state.phase
    }
}

/// A control transfer that happened inside the substrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHandoff {
    /// Agent that received control
    pub agent: String,
    /// Phase the agent reported working on, when it said so
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<InvestigationPhase>,
}

impl AgentHandoff {
    pub fn new(agent: impl Into<String>, phase: Option<InvestigationPhase>) -> Self {
        Self {
            agent: agent.into(),
            phase,
        }
    }
}

/// Aggregated result of one substrate call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstrateResponse {
    /// Final text produced by the last agent
    pub content: String,
    /// Cumulative token counters for the whole run so far
    pub usage: TokenUsage,
    /// Agent that produced the final content
    pub agent: String,
    /// Internal handoffs observed during the call, in order
    #[serde(default)]
    pub handoffs: Vec<AgentHandoff>,
    /// Wall-clock time spent in the call
    pub response_time: Duration,
}

impl SubstrateResponse {
    /// Response without internal handoffs
    pub fn text(
        agent: impl Into<String>,
        content: impl Into<String>,
        usage: TokenUsage,
        response_time: Duration,
    ) -> Self {
        Self {
            content: content.into(),
            usage,
            agent: agent.into(),
            handoffs: Vec::new(),
            response_time,
        }
    }

    pub fn with_handoffs(mut self, handoffs: Vec<AgentHandoff>) -> Self {
        self.handoffs = handoffs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_phase_comes_from_shared_state() {
        let request = SubstrateRequest::new(
            "analyze",
            SharedState::new("run-1", InvestigationPhase::HypothesisGeneration),
            Budget::default(),
        );
        assert_eq!(request.phase(), InvestigationPhase::HypothesisGeneration);
    }

    #[test]
    fn test_handoff_phase_is_optional_in_json() {
        let handoff: AgentHandoff =
            serde_json::from_str(r#"{"agent": "lambda_specialist"}"#).unwrap();
        assert_eq!(handoff, AgentHandoff::new("lambda_specialist", None));

        let handoff: AgentHandoff =
            serde_json::from_str(r#"{"agent": "x", "phase": "SERVICE_ANALYSIS"}"#).unwrap();
        assert_eq!(handoff.phase, Some(InvestigationPhase::ServiceAnalysis));
    }

    #[test]
    fn test_shared_state_omits_missing_symptom() {
        let state = SharedState::new("run-1", InvestigationPhase::TraceAnalysis);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["phase"], "TRACE_ANALYSIS");
        assert!(json.get("symptom").is_none());
    }
}
