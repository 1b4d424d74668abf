use super::termination::TerminationReason;
use chrono::{DateTime, Utc};
use rootscope_core::{InvestigationPhase, TokenUsage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One control transfer between agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub timestamp: DateTime<Utc>,
    pub from_phase: InvestigationPhase,
    pub to_phase: InvestigationPhase,
    pub agent: String,
}

/// Per-run investigation state. Owned and mutated only by the flow controller.
#[derive(Debug, Clone, Serialize)]
pub struct InvestigationProgress {
    pub current_phase: InvestigationPhase,
    pub phases_completed: BTreeMap<InvestigationPhase, bool>,
    pub handoff_history: Vec<HandoffRecord>,
    pub unique_agents_used: BTreeSet<String>,
    pub token_usage: TokenUsage,
    pub cost_estimate: f64,
    pub early_termination: Option<TerminationReason>,
}

impl Default for InvestigationProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl InvestigationProgress {
    pub fn new() -> Self {
        Self {
            current_phase: InvestigationPhase::TraceAnalysis,
            phases_completed: InvestigationPhase::WORKING
                .into_iter()
                .map(|phase| (phase, false))
                .collect(),
            handoff_history: Vec::new(),
            unique_agents_used: BTreeSet::new(),
            token_usage: TokenUsage::default(),
            cost_estimate: 0.0,
            early_termination: None,
        }
    }

    /// Records a handoff to `agent` working on `new_phase`.
    ///
    /// The previous phase is marked complete only when the phase changes.
    /// Ordering is not validated: a backward report is kept in the history
    /// but never moves `current_phase` backward. Terminal states are set only
    /// through `complete`, `terminate` and `fail`; an agent reporting one is
    /// recorded as staying in the current phase.
    pub fn advance(&mut self, new_phase: InvestigationPhase, agent: &str) {
        let from_phase = self.current_phase;
        let new_phase = if new_phase.is_terminal() { from_phase } else { new_phase };
        if new_phase != from_phase {
            self.phases_completed.insert(from_phase, true);
        }

        self.handoff_history.push(HandoffRecord {
            timestamp: Utc::now(),
            from_phase,
            to_phase: new_phase,
            agent: agent.to_string(),
        });
        self.unique_agents_used.insert(agent.to_string());

        if new_phase > self.current_phase {
            self.current_phase = new_phase;
        }
    }

    /// Substrate counters are cumulative, so they replace ours.
    pub fn record_usage(&mut self, usage: TokenUsage) {
        self.token_usage = usage;
    }

    /// Normal end of the phase sequence.
    pub fn complete(&mut self) {
        if self.current_phase.is_terminal() {
            return;
        }
        self.phases_completed.insert(self.current_phase, true);
        self.current_phase = InvestigationPhase::Complete;
    }

    pub fn terminate(&mut self, reason: TerminationReason) {
        if self.early_termination.is_some() {
            return;
        }
        self.current_phase = reason.terminal_phase();
        self.early_termination = Some(reason);
    }

    pub fn fail(&mut self) {
        self.current_phase = InvestigationPhase::Failed;
    }

    pub fn handoff_count(&self) -> usize {
        self.handoff_history.len()
    }

    pub fn unique_agent_count(&self) -> usize {
        self.unique_agents_used.len()
    }

    /// Agents of the most recent `n` handoffs, oldest first.
    pub fn recent_agents(&self, n: usize) -> Vec<&str> {
        let start = self.handoff_history.len().saturating_sub(n);
        self.handoff_history[start..]
            .iter()
            .map(|h| h.agent.as_str())
            .collect()
    }

    pub fn is_terminated(&self) -> bool {
        self.early_termination.is_some()
    }
}
