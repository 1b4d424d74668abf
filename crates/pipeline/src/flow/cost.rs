use super::progress::InvestigationProgress;
use rootscope_core::{FlowLimits, InvestigationPhase};

/// Heuristic cost estimate, written back to `progress.cost_estimate`.
///
/// `max(1, resources) * base * (1 + agent_factor * agents + phase_factor * phase)`.
/// The stored value never decreases within a run.
pub fn estimate_cost(
    resource_count: usize,
    progress: &mut InvestigationProgress,
    limits: &FlowLimits,
) -> f64 {
    let phase_position = progress
        .current_phase
        .ordinal()
        .min(InvestigationPhase::Complete.ordinal());

    let complexity = 1.0
        + limits.agent_complexity_factor * progress.unique_agent_count() as f64
        + limits.phase_complexity_factor * phase_position as f64;
    let estimate = resource_count.max(1) as f64 * limits.base_cost_per_resource * complexity;

    progress.cost_estimate = progress.cost_estimate.max(estimate);
    progress.cost_estimate
}
