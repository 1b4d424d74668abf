use super::types::{SubstrateRequest, SubstrateResponse};
use async_trait::async_trait;
use rootscope_core::SubstrateError;

#[async_trait]
pub trait AgentSubstrate: Send + Sync {
    /// One round-trip. Internal handoffs and tool calls happen inside the
    /// substrate; exactly one aggregated response comes back per call.
    async fn invoke(&self, request: SubstrateRequest) -> Result<SubstrateResponse, SubstrateError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }

    /// Called once when a run ends, on every exit path. Substrates holding
    /// per-run state drop it here.
    fn finish_run(&self, _run_id: &str) {}
}
