pub mod probe;
pub mod session;
pub mod substrate;

pub use ::genai::adapter::AdapterKind;
pub use probe::{FixtureProbe, Probe, ProbeRegistry, ProbeResult};
pub use rootscope_core::SubstrateError;
pub use session::{CloudSession, SessionError, SessionGuard, SessionProvider, StaticSessionProvider};
pub use substrate::{
    AgentHandoff, AgentSubstrate, Budget, GenAiSubstrate, MockResponse, MockSubstrate,
    RecordedExchange, RecordingMode, RecordingSubstrate, SharedState, SubstrateRequest,
    SubstrateResponse,
};
