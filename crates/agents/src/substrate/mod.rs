//! Agent substrate boundary
//!
//! The substrate is the external multi-agent runtime that actually reasons
//! about an investigation. The engine sees it as an opaque async function from
//! (prompt, shared state, budget) to an aggregated result with usage counters.

mod client;
mod genai;
mod mock;
mod recording;
mod types;

pub use client::AgentSubstrate;
pub use genai::{parse_handoffs, phase_agent, GenAiSubstrate};
pub use mock::{MockResponse, MockSubstrate};
pub use recording::{RecordedExchange, RecordingMode, RecordingSubstrate};
pub use types::{AgentHandoff, Budget, SharedState, SubstrateRequest, SubstrateResponse};
