use super::cost::estimate_cost;
use super::progress::InvestigationProgress;
use super::termination::{check_early_termination, TerminationReason};
use rootscope_agents::{Budget, SubstrateResponse};
use rootscope_core::{FlowLimits, InvestigationPhase};
use tracing::{debug, warn};

/// Supervises the substrate loop: accounting after every round-trip and the
/// decision to stop early.
#[derive(Debug, Clone)]
pub struct FlowController {
    limits: FlowLimits,
    progress: InvestigationProgress,
}

impl FlowController {
    pub fn new(limits: FlowLimits) -> Self {
        Self {
            limits,
            progress: InvestigationProgress::new(),
        }
    }

    pub fn limits(&self) -> &FlowLimits {
        &self.limits
    }

    pub fn progress(&self) -> &InvestigationProgress {
        &self.progress
    }

    /// What is left of the run's allowance, handed to the next substrate call.
    pub fn budget(&self, max_response_tokens: u32) -> Budget {
        Budget {
            remaining_tokens: self
                .limits
                .max_tokens
                .saturating_sub(self.progress.token_usage.total),
            remaining_cost: (self.limits.max_cost - self.progress.cost_estimate).max(0.0),
            remaining_handoffs: self
                .limits
                .max_handoffs
                .saturating_sub(self.progress.handoff_count()),
            max_response_tokens,
        }
    }

    /// Folds one substrate response into the progress and checks the stop
    /// conditions. Returns the reason when the run must stop.
    ///
    /// Internal handoffs are recorded in order; a response without any counts
    /// as a single handoff to the responding agent. A handoff naming no phase,
    /// or a terminal one, is attributed to `phase`.
    pub fn record_response(
        &mut self,
        phase: InvestigationPhase,
        response: &SubstrateResponse,
        resource_count: usize,
    ) -> Option<TerminationReason> {
        if response.handoffs.is_empty() {
            self.progress.advance(phase, &response.agent);
        } else {
            for handoff in &response.handoffs {
                let reported = handoff.phase.filter(|p| !p.is_terminal());
                self.progress.advance(reported.unwrap_or(phase), &handoff.agent);
            }
        }

        self.progress.record_usage(response.usage);
        let cost = estimate_cost(resource_count, &mut self.progress, &self.limits);

        debug!(
            phase = %phase,
            handoffs = self.progress.handoff_count(),
            agents = self.progress.unique_agent_count(),
            total_tokens = self.progress.token_usage.total,
            cost_estimate = cost,
            "Recorded substrate response"
        );

        let reason = check_early_termination(&self.progress, &self.limits)?;
        warn!(phase = %phase, reason = %reason, "Stopping investigation early");
        self.progress.terminate(reason.clone());
        Some(reason)
    }

    pub fn complete(&mut self) {
        self.progress.complete();
    }

    pub fn fail(&mut self) {
        self.progress.fail();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootscope_agents::AgentHandoff;
    use rootscope_core::TokenUsage;
    use std::time::Duration;

    fn response(agent: &str, input: u64, output: u64) -> SubstrateResponse {
        SubstrateResponse::text(agent, "ok", TokenUsage::new(input, output), Duration::ZERO)
    }

    #[test]
    fn test_response_without_handoffs_counts_once() {
        let mut flow = FlowController::new(FlowLimits::default());
        let reason = flow.record_response(
            InvestigationPhase::TraceAnalysis,
            &response("trace_specialist", 100, 20),
            2,
        );
        assert!(reason.is_none());
        assert_eq!(flow.progress().handoff_count(), 1);
        assert_eq!(flow.progress().token_usage.total, 120);
        assert!(flow.progress().cost_estimate > 0.0);
    }

    #[test]
    fn test_handoff_phases_default_to_engine_phase() {
        let mut flow = FlowController::new(FlowLimits::default());
        let resp = response("b", 1, 1).with_handoffs(vec![
            AgentHandoff::new("a", None),
            AgentHandoff::new("b", Some(InvestigationPhase::HypothesisGeneration)),
        ]);
        flow.record_response(InvestigationPhase::ServiceAnalysis, &resp, 1);

        let history = &flow.progress().handoff_history;
        assert_eq!(history[0].to_phase, InvestigationPhase::ServiceAnalysis);
        assert_eq!(history[1].to_phase, InvestigationPhase::HypothesisGeneration);
        assert_eq!(
            flow.progress().current_phase,
            InvestigationPhase::HypothesisGeneration
        );
    }

    #[test]
    fn test_reported_terminal_phase_is_ignored() {
        let mut flow = FlowController::new(FlowLimits::default());
        flow.record_response(InvestigationPhase::TraceAnalysis, &response("a", 1, 1), 1);
        let resp = response("b", 10, 10).with_handoffs(vec![
            AgentHandoff::new("a", Some(InvestigationPhase::Failed)),
            AgentHandoff::new("b", Some(InvestigationPhase::CostLimited)),
        ]);
        let reason = flow.record_response(InvestigationPhase::ServiceAnalysis, &resp, 1);

        assert!(reason.is_none());
        assert_eq!(flow.progress().current_phase, InvestigationPhase::ServiceAnalysis);
        assert!(flow.progress().handoff_history[1..]
            .iter()
            .all(|h| h.to_phase == InvestigationPhase::ServiceAnalysis));
        assert!(flow.progress().phases_completed[&InvestigationPhase::TraceAnalysis]);

        flow.complete();
        assert_eq!(flow.progress().current_phase, InvestigationPhase::Complete);
    }

    #[test]
    fn test_token_limit_terminates() {
        let limits = FlowLimits::default().with_max_tokens(1_000);
        let mut flow = FlowController::new(limits);
        let reason = flow
            .record_response(InvestigationPhase::TraceAnalysis, &response("a", 900, 200), 1)
            .unwrap();
        assert!(matches!(reason, TerminationReason::TokenLimit { used: 1100, .. }));
        assert_eq!(flow.progress().current_phase, InvestigationPhase::TokenLimited);
        assert!(flow.progress().is_terminated());
    }

    #[test]
    fn test_budget_shrinks() {
        let mut flow = FlowController::new(FlowLimits::default());
        flow.record_response(InvestigationPhase::TraceAnalysis, &response("a", 1_000, 0), 1);
        let budget = flow.budget(512);
        assert_eq!(budget.remaining_tokens, 199_000);
        assert_eq!(budget.remaining_handoffs, 19);
        assert_eq!(budget.max_response_tokens, 512);
        assert!(budget.remaining_cost < 2.0);
    }
}
