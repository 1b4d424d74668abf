// Investigation phases, numbered in execution order.
//
// Each phase owns its prompt builder; SERVICE_ANALYSIS also runs the
// registered probes before calling the substrate.

mod prompt;

#[path = "01_trace_analysis.rs"]
pub mod trace_analysis;
#[path = "02_service_analysis.rs"]
pub mod service_analysis;
#[path = "03_hypothesis_generation.rs"]
pub mod hypothesis_generation;
#[path = "04_root_cause_analysis.rs"]
pub mod root_cause_analysis;

pub use hypothesis_generation::HypothesisGenerationPhase;
pub use root_cause_analysis::RootCauseAnalysisPhase;
pub use service_analysis::ServiceAnalysisPhase;
pub use trace_analysis::TraceAnalysisPhase;

use crate::phase_trait::WorkflowPhase;

/// The working phases in execution order.
pub fn default_phases() -> Vec<Box<dyn WorkflowPhase>> {
    vec![
        Box::new(TraceAnalysisPhase),
        Box::new(ServiceAnalysisPhase),
        Box::new(HypothesisGenerationPhase),
        Box::new(RootCauseAnalysisPhase),
    ]
}
