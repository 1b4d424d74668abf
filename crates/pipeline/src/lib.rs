pub mod context;
pub mod error;
pub mod extraction;
pub mod facts;
pub mod flow;
pub mod orchestrator;
pub mod phase_trait;
pub mod phases;
pub mod report;
pub mod request;

pub use context::InvestigationContext;
pub use error::InvestigationError;
pub use extraction::{extract, extract_for_trace, ExtractError, ExtractionOutcome, ResourceGraph};
pub use facts::FactNormalizer;
pub use flow::{FlowController, InvestigationProgress, TerminationReason};
pub use orchestrator::InvestigationOrchestrator;
pub use phase_trait::WorkflowPhase;
pub use report::{assemble, RunOutcome, RunTimings};
pub use request::{InvestigationRequest, RequestError, TargetSpec};
