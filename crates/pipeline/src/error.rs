use crate::extraction::ExtractError;
use crate::request::RequestError;
use rootscope_agents::SessionError;
use rootscope_core::{InvestigationPhase, SubstrateError};
use thiserror::Error;

/// Anything that turns a run into a `failed` report
#[derive(Error, Debug)]
pub enum InvestigationError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Trace extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Substrate call failed during {phase}: {source}")]
    Substrate {
        phase: InvestigationPhase,
        source: SubstrateError,
    },

    #[error("Substrate call timed out after {seconds}s during {phase}")]
    CallTimeout {
        phase: InvestigationPhase,
        seconds: u64,
    },

    #[error("Investigation exceeded its total timeout of {seconds}s")]
    TotalTimeout { seconds: u64 },

    #[error("Phase {phase} failed: {message}")]
    Phase {
        phase: InvestigationPhase,
        message: String,
    },
}
