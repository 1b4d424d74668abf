use crate::context::InvestigationContext;
use anyhow::Result;
use async_trait::async_trait;
use rootscope_agents::SubstrateResponse;
use rootscope_core::InvestigationPhase;

/// One working phase of the investigation. Phases run strictly in order and
/// each makes exactly one substrate round-trip.
#[async_trait]
pub trait WorkflowPhase: Send + Sync {
    fn phase(&self) -> InvestigationPhase;

    fn name(&self) -> &'static str {
        self.phase().name()
    }

    /// Local work before the substrate call.
    async fn prepare(&self, _context: &mut InvestigationContext) -> Result<()> {
        Ok(())
    }

    fn build_prompt(&self, context: &InvestigationContext) -> String;

    /// Folds the substrate answer into the context and returns how many facts it added.
    fn absorb(&self, context: &mut InvestigationContext, response: &SubstrateResponse) -> usize {
        let facts = context
            .normalizer
            .from_text(&response.content, &response.agent);
        let added = facts.len();
        context.facts.extend(facts);
        added
    }
}
