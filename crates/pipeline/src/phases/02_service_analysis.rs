use super::prompt::{fact_lines, resource_lines, symptom_line};
use crate::context::InvestigationContext;
use crate::phase_trait::WorkflowPhase;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rootscope_core::{InvestigationPhase, ProgressEvent};
use std::time::Instant;
use tracing::{debug, warn};

pub struct ServiceAnalysisPhase;

fn build_prompt(context: &InvestigationContext) -> String {
    format!(
        r#"Assess the health and configuration of each resource involved in the incident.

{}

Resources:
{}

Evidence so far (trace analysis and service probes):
{}

For every resource, state whether its configuration, limits or recent
behaviour could explain the symptom. Flag anything abnormal with
"potential_issue": true.

Respond with JSON:
{{
  "facts": [
    {{"content": "finding", "confidence": 0.0-1.0, "metadata": {{"resource": "type:name", "potential_issue": false}}}}
  ]
}}
"#,
        symptom_line(context),
        resource_lines(context),
        fact_lines(&context.facts),
    )
}

#[async_trait]
impl WorkflowPhase for ServiceAnalysisPhase {
    fn phase(&self) -> InvestigationPhase {
        InvestigationPhase::ServiceAnalysis
    }

    /// Probes every discovered resource that has a registered probe. A
    /// failing probe becomes an issue fact; it never fails the phase.
    async fn prepare(&self, context: &mut InvestigationContext) -> Result<()> {
        if context.probes.is_empty() {
            debug!("No probes registered, skipping service probes");
            return Ok(());
        }

        let session = context
            .session
            .clone()
            .context("Service probes require an active cloud session")?;

        let resources = context.graph.resources.clone();
        for resource in &resources {
            let Some(probe) = context.probes.get(resource.resource_type) else {
                continue;
            };

            let region = resource.region.as_deref().unwrap_or(&context.region);
            let start = Instant::now();
            let result = probe.probe(&resource.name, region, &session).await;

            if !result.is_success() {
                warn!(resource = %resource.label(), probe = probe.name(), "Probe reported an error");
            }
            context.emit(ProgressEvent::ProbeComplete {
                resource: resource.label(),
                success: result.is_success(),
                execution_time: start.elapsed(),
            });

            let facts = context.normalizer.from_probe(resource, &result);
            context.facts.extend(facts);
        }

        Ok(())
    }

    fn build_prompt(&self, context: &InvestigationContext) -> String {
        build_prompt(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InvestigationRequest;
    use rootscope_agents::{CloudSession, Probe, ProbeRegistry, ProbeResult};
    use rootscope_core::{DiscoverySource, FlowLimits, Resource, ResourceType};
    use serde_json::json;
    use std::sync::Arc;

    struct StaticProbe(ProbeResult);

    #[async_trait]
    impl Probe for StaticProbe {
        async fn probe(&self, _name: &str, _region: &str, _session: &CloudSession) -> ProbeResult {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    fn context(registry: ProbeRegistry, with_session: bool) -> InvestigationContext {
        let mut ctx = InvestigationContext::new(
            "run-1",
            InvestigationRequest::for_symptom("slow checkout"),
            "us-east-1",
            FlowLimits::default(),
            Arc::new(registry),
            None,
        );
        ctx.graph.insert_resource(Resource::new(
            ResourceType::Lambda,
            "checkout",
            DiscoverySource::Trace,
        ));
        ctx.graph.insert_resource(Resource::new(
            ResourceType::DynamoDb,
            "orders",
            DiscoverySource::Trace,
        ));
        if with_session {
            ctx.session = Some(CloudSession {
                session_id: "s-1".to_string(),
                region: "us-east-1".to_string(),
                profile: None,
            });
        }
        ctx
    }

    #[tokio::test]
    async fn test_probe_results_become_facts() {
        let mut registry = ProbeRegistry::new();
        registry.register(
            ResourceType::Lambda,
            Arc::new(StaticProbe(ProbeResult::Success {
                payload: json!({"timeout": 3}),
            })),
        );
        registry.register(
            ResourceType::DynamoDb,
            Arc::new(StaticProbe(ProbeResult::error("AccessDeniedException"))),
        );

        let mut ctx = context(registry, true);
        ServiceAnalysisPhase.prepare(&mut ctx).await.unwrap();

        assert_eq!(ctx.facts.len(), 2);
        assert!(!ctx.facts[0].is_issue());
        assert!(ctx.facts[1].is_issue());
        assert!(ServiceAnalysisPhase.build_prompt(&ctx).contains("AccessDeniedException"));
    }

    #[tokio::test]
    async fn test_no_probes_is_a_no_op() {
        let mut ctx = context(ProbeRegistry::new(), false);
        ServiceAnalysisPhase.prepare(&mut ctx).await.unwrap();
        assert!(ctx.facts.is_empty());
    }

    #[tokio::test]
    async fn test_probes_without_session_fail() {
        let mut ctx = context(ProbeRegistry::from_fixture_dir("/nonexistent"), false);
        let err = ServiceAnalysisPhase.prepare(&mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("cloud session"));
    }
}
