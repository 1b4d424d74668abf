use super::progress::InvestigationProgress;
use rootscope_core::{FlowLimits, InvestigationPhase, ReportStatus};
use serde::Serialize;
use std::fmt;

/// Why the investigation loop stopped before `COMPLETE`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    RepetitiveHandoff {
        first: String,
        second: String,
        window: usize,
    },
    HandoffLimit {
        count: usize,
        max: usize,
    },
    TokenLimit {
        used: u64,
        max: u64,
    },
    CostLimit {
        estimate: f64,
        max: f64,
    },
}

impl TerminationReason {
    pub fn status(&self) -> ReportStatus {
        match self {
            TerminationReason::RepetitiveHandoff { .. } => ReportStatus::RepetitiveHandoffDetected,
            TerminationReason::HandoffLimit { .. } => ReportStatus::HandoffLimited,
            TerminationReason::TokenLimit { .. } => ReportStatus::TokenLimited,
            TerminationReason::CostLimit { .. } => ReportStatus::CostLimited,
        }
    }

    pub fn terminal_phase(&self) -> InvestigationPhase {
        match self {
            TerminationReason::RepetitiveHandoff { .. } => InvestigationPhase::RepetitiveHandoff,
            TerminationReason::HandoffLimit { .. } => InvestigationPhase::HandoffLimited,
            TerminationReason::TokenLimit { .. } => InvestigationPhase::TokenLimited,
            TerminationReason::CostLimit { .. } => InvestigationPhase::CostLimited,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::RepetitiveHandoff {
                first,
                second,
                window,
            } => write!(
                f,
                "repetitive handoff detected between {} and {} over last {} handoffs",
                first, second, window
            ),
            TerminationReason::HandoffLimit { count, max } => {
                write!(f, "handoff limit exceeded: {} handoffs (max {})", count, max)
            }
            TerminationReason::TokenLimit { used, max } => {
                write!(f, "token limit exceeded: {} tokens (max {})", used, max)
            }
            TerminationReason::CostLimit { estimate, max } => write!(
                f,
                "cost limit exceeded: estimated ${:.4} (max ${:.4})",
                estimate, max
            ),
        }
    }
}

/// Checks the stop conditions in fixed priority order: repetitive handoff,
/// handoff count, total tokens, cost estimate.
pub fn check_early_termination(
    progress: &InvestigationProgress,
    limits: &FlowLimits,
) -> Option<TerminationReason> {
    if let Some((first, second)) = detect_oscillation(progress, limits.repetition_window) {
        return Some(TerminationReason::RepetitiveHandoff {
            first,
            second,
            window: limits.repetition_window,
        });
    }

    let count = progress.handoff_count();
    if count > limits.max_handoffs {
        return Some(TerminationReason::HandoffLimit {
            count,
            max: limits.max_handoffs,
        });
    }

    let used = progress.token_usage.total;
    if used > limits.max_tokens {
        return Some(TerminationReason::TokenLimit {
            used,
            max: limits.max_tokens,
        });
    }

    if progress.cost_estimate > limits.max_cost {
        return Some(TerminationReason::CostLimit {
            estimate: progress.cost_estimate,
            max: limits.max_cost,
        });
    }

    None
}

/// The last `window` agents alternate A,B,A,B with A != B.
fn detect_oscillation(progress: &InvestigationProgress, window: usize) -> Option<(String, String)> {
    if window < 2 || progress.handoff_count() < window {
        return None;
    }

    let recent = progress.recent_agents(window);
    let (first, second) = (recent[0], recent[1]);
    if first == second {
        return None;
    }

    let alternates = recent
        .iter()
        .enumerate()
        .all(|(i, agent)| *agent == if i % 2 == 0 { first } else { second });

    alternates.then(|| (first.to_string(), second.to_string()))
}
