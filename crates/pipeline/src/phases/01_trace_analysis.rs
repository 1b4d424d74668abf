use super::prompt::{relationship_lines, resource_lines, symptom_line};
use crate::context::InvestigationContext;
use crate::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use rootscope_core::InvestigationPhase;

pub struct TraceAnalysisPhase;

fn build_prompt(context: &InvestigationContext) -> String {
    let graph = &context.graph;
    let trace_ids = if graph.trace_ids.is_empty() {
        "(no trace data supplied)".to_string()
    } else {
        graph.trace_ids.join(", ")
    };

    format!(
        r#"Analyze the distributed traces of a failing request path.

{}
Traces: {}
Total traced duration: {:.3}s
Segments that could not be decoded: {}

Resources on the request path:
{}

Observed calls:
{}

Identify which resources recorded errors, faults or throttling, where latency
accumulates, and which call edges look suspicious. Only reference resources
from the list above.

Respond with JSON:
{{
  "facts": [
    {{"content": "what you observed", "confidence": 0.0-1.0, "metadata": {{"resource": "type:name", "potential_issue": true}}}}
  ]
}}
"#,
        symptom_line(context),
        trace_ids,
        graph.total_duration_secs,
        graph.parse_misses.len(),
        resource_lines(context),
        relationship_lines(context),
    )
}

#[async_trait]
impl WorkflowPhase for TraceAnalysisPhase {
    fn phase(&self) -> InvestigationPhase {
        InvestigationPhase::TraceAnalysis
    }

    fn build_prompt(&self, context: &InvestigationContext) -> String {
        build_prompt(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InvestigationRequest;
    use rootscope_agents::ProbeRegistry;
    use rootscope_core::{DiscoverySource, FlowLimits, Resource, ResourceType};
    use std::sync::Arc;

    fn context() -> InvestigationContext {
        InvestigationContext::new(
            "run-1",
            InvestigationRequest::for_symptom("checkout returns 502"),
            "us-east-1",
            FlowLimits::default(),
            Arc::new(ProbeRegistry::new()),
            None,
        )
    }

    #[test]
    fn test_prompt_lists_resources_and_symptom() {
        let mut ctx = context();
        ctx.graph.trace_ids.push("1-abc".to_string());
        ctx.graph.insert_resource(
            Resource::new(ResourceType::ApiGateway, "abc123def", DiscoverySource::Trace)
                .with_stage("prod"),
        );

        let prompt = TraceAnalysisPhase.build_prompt(&ctx);
        assert!(prompt.contains("apigateway:abc123def stage=prod"));
        assert!(prompt.contains("checkout returns 502"));
        assert!(prompt.contains("Traces: 1-abc"));
    }

    #[test]
    fn test_prompt_without_trace_data() {
        let prompt = TraceAnalysisPhase.build_prompt(&context());
        assert!(prompt.contains("(no trace data supplied)"));
        assert!(prompt.contains("(no resources discovered)"));
        assert_eq!(TraceAnalysisPhase.name(), "TRACE_ANALYSIS");
    }
}
