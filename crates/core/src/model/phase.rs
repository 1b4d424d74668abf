use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stage of the investigation state machine.
///
/// The first five variants form the nominal sequence; the remaining ones are
/// early-exit terminal states reachable from any working phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestigationPhase {
    TraceAnalysis,
    ServiceAnalysis,
    HypothesisGeneration,
    RootCauseAnalysis,
    Complete,
    CostLimited,
    TokenLimited,
    HandoffLimited,
    RepetitiveHandoff,
    Failed,
}

impl InvestigationPhase {
    /// Phases that invoke the substrate, in execution order
    pub const WORKING: [InvestigationPhase; 4] = [
        InvestigationPhase::TraceAnalysis,
        InvestigationPhase::ServiceAnalysis,
        InvestigationPhase::HypothesisGeneration,
        InvestigationPhase::RootCauseAnalysis,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InvestigationPhase::TraceAnalysis => "TRACE_ANALYSIS",
            InvestigationPhase::ServiceAnalysis => "SERVICE_ANALYSIS",
            InvestigationPhase::HypothesisGeneration => "HYPOTHESIS_GENERATION",
            InvestigationPhase::RootCauseAnalysis => "ROOT_CAUSE_ANALYSIS",
            InvestigationPhase::Complete => "COMPLETE",
            InvestigationPhase::CostLimited => "COST_LIMITED",
            InvestigationPhase::TokenLimited => "TOKEN_LIMITED",
            InvestigationPhase::HandoffLimited => "HANDOFF_LIMITED",
            InvestigationPhase::RepetitiveHandoff => "REPETITIVE_HANDOFF",
            InvestigationPhase::Failed => "FAILED",
        }
    }

    /// Position in the nominal sequence. Early-exit states sort after `Complete`.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn is_terminal(self) -> bool {
        self.ordinal() >= InvestigationPhase::Complete.ordinal()
    }

    pub fn next(self) -> Option<InvestigationPhase> {
        match self {
            InvestigationPhase::TraceAnalysis => Some(InvestigationPhase::ServiceAnalysis),
            InvestigationPhase::ServiceAnalysis => Some(InvestigationPhase::HypothesisGeneration),
            InvestigationPhase::HypothesisGeneration => Some(InvestigationPhase::RootCauseAnalysis),
            InvestigationPhase::RootCauseAnalysis => Some(InvestigationPhase::Complete),
            _ => None,
        }
    }
}

impl fmt::Display for InvestigationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InvestigationPhase {
    type Err = String;

    /// Accepts `TRACE_ANALYSIS`, `trace_analysis` and `trace-analysis`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        [
            InvestigationPhase::TraceAnalysis,
            InvestigationPhase::ServiceAnalysis,
            InvestigationPhase::HypothesisGeneration,
            InvestigationPhase::RootCauseAnalysis,
            InvestigationPhase::Complete,
            InvestigationPhase::CostLimited,
            InvestigationPhase::TokenLimited,
            InvestigationPhase::HandoffLimited,
            InvestigationPhase::RepetitiveHandoff,
            InvestigationPhase::Failed,
        ]
        .into_iter()
        .find(|phase| phase.name() == normalized)
        .ok_or_else(|| format!("Unknown investigation phase: {}", s))
    }
}

/// Token counters as reported by the substrate (cumulative for the run)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }
}
