//! Turns the accumulated state of a run into its single `InvestigationReport`.

mod assembler;
mod severity;

pub use assembler::{assemble, RunOutcome, RunTimings};
pub use severity::assess_severity;
