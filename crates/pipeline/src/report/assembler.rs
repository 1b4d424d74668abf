use super::severity::assess_severity;
use crate::context::InvestigationContext;
use crate::flow::TerminationReason;
use chrono::{DateTime, Utc};
use rootscope_core::output::schema::{
    AffectedResource, CostControlSnapshot, FlowControlSnapshot, HealthStatus, ReportSummary,
    TimelineEvent,
};
use rootscope_core::{Fact, InvestigationReport, ReportStatus};
use serde_json::json;
use tracing::info;

const FLOW_CONTROL_SOURCE: &str = "flow_control";

/// How the run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    EarlyTermination(TerminationReason),
    Failed(String),
}

impl RunOutcome {
    pub fn status(&self) -> ReportStatus {
        match self {
            RunOutcome::Completed => ReportStatus::Completed,
            RunOutcome::EarlyTermination(reason) => reason.status(),
            RunOutcome::Failed(_) => ReportStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunTimings {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunTimings {
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            completed_at: now,
        }
    }

    pub fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self
    }

    pub fn duration_ms(&self) -> u64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Builds the report for a finished run. Consumes nothing from the context so
/// it can be called on whatever a cancelled run left behind.
pub fn assemble(
    context: &InvestigationContext,
    outcome: RunOutcome,
    timings: RunTimings,
) -> InvestigationReport {
    let progress = context.flow.progress();
    let limits = context.flow.limits();
    let status = outcome.status();

    let severity = assess_severity(&context.facts);

    let mut facts = context.facts.clone();
    facts.extend(flow_control_facts(context, &outcome));

    let health_status = if status == ReportStatus::Completed {
        HealthStatus::Unknown
    } else {
        HealthStatus::NotAnalyzed
    };
    let affected_resources = context
        .graph
        .resources
        .iter()
        .map(|resource| AffectedResource {
            resource: resource.clone(),
            health_status,
        })
        .collect();

    let timeline = progress
        .handoff_history
        .iter()
        .map(|record| TimelineEvent {
            timestamp: record.timestamp,
            event: if record.from_phase != record.to_phase {
                "phase_transition".to_string()
            } else {
                "handoff".to_string()
            },
            from_phase: record.from_phase,
            to_phase: record.to_phase,
            agent: record.agent.clone(),
        })
        .collect();

    let termination_reason = match &outcome {
        RunOutcome::EarlyTermination(reason) => Some(reason.to_string()),
        _ => None,
    };

    let summary = ReportSummary {
        trace_ids: context.graph.trace_ids.clone(),
        resource_count: context.graph.resources.len(),
        relationship_count: context.graph.relationships.len(),
        fact_count: facts.len(),
        parse_misses: context.graph.parse_misses.len(),
        flow_control: FlowControlSnapshot {
            final_phase: progress.current_phase,
            unique_agents: progress.unique_agents_used.iter().cloned().collect(),
            unique_agent_count: progress.unique_agent_count(),
            handoff_count: progress.handoff_count(),
            phases_completed: progress.phases_completed.clone(),
            early_termination: termination_reason.is_some(),
            termination_reason,
        },
        cost_control: CostControlSnapshot {
            token_usage: progress.token_usage,
            cost_estimate: progress.cost_estimate,
            max_cost: limits.max_cost,
            max_tokens: limits.max_tokens,
            max_handoffs: limits.max_handoffs,
        },
        error: match &outcome {
            RunOutcome::Failed(error) => Some(error.clone()),
            _ => None,
        },
    };

    info!(
        run_id = %context.run_id,
        status = %status,
        facts = facts.len(),
        severity = ?severity.level,
        "Assembled investigation report"
    );

    InvestigationReport {
        run_id: context.run_id.clone(),
        status,
        started_at: timings.started_at,
        completed_at: timings.completed_at,
        duration_ms: timings.duration_ms(),
        facts,
        affected_resources,
        relationships: context.graph.relationships.clone(),
        severity,
        root_cause_analysis: context.root_cause.clone(),
        timeline,
        summary,
    }
}

fn flow_control_facts(context: &InvestigationContext, outcome: &RunOutcome) -> Vec<Fact> {
    let progress = context.flow.progress();
    let agents: Vec<&String> = progress.unique_agents_used.iter().collect();

    let mut facts = vec![
        Fact::new(
            FLOW_CONTROL_SOURCE,
            format!(
                "Investigation involved {} distinct agents",
                progress.unique_agent_count()
            ),
            1.0,
        )
        .with_metadata("flow_control", json!("agent_diversity"))
        .with_metadata("unique_agents", json!(agents)),
        Fact::new(
            FLOW_CONTROL_SOURCE,
            format!(
                "Investigation performed {} agent handoffs",
                progress.handoff_count()
            ),
            1.0,
        )
        .with_metadata("flow_control", json!("handoff_count"))
        .with_metadata("handoff_count", json!(progress.handoff_count())),
    ];

    match outcome {
        RunOutcome::Completed => {}
        RunOutcome::EarlyTermination(reason) => facts.push(
            Fact::new(
                FLOW_CONTROL_SOURCE,
                format!("Investigation terminated early: {}", reason),
                1.0,
            )
            .with_metadata("flow_control", json!("early_termination"))
            .with_metadata("termination_reason", json!(reason)),
        ),
        RunOutcome::Failed(error) => facts.push(
            Fact::new(
                FLOW_CONTROL_SOURCE,
                format!("Investigation failed: {}", error),
                1.0,
            )
            .with_metadata("flow_control", json!("failure")),
        ),
    }

    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InvestigationRequest;
    use rootscope_agents::{ProbeRegistry, SubstrateResponse};
    use rootscope_core::output::schema::Severity;
    use rootscope_core::{
        DiscoverySource, FlowLimits, InvestigationPhase, Resource, ResourceType, TokenUsage,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn context() -> InvestigationContext {
        let mut ctx = InvestigationContext::new(
            "run-42",
            InvestigationRequest::for_symptom("slow"),
            "us-east-1",
            FlowLimits::default(),
            Arc::new(ProbeRegistry::new()),
            None,
        );
        ctx.graph.insert_resource(Resource::new(
            ResourceType::Lambda,
            "checkout",
            DiscoverySource::Trace,
        ));
        ctx
    }

    fn respond(ctx: &mut InvestigationContext, phase: InvestigationPhase, agent: &str) {
        let response =
            SubstrateResponse::text(agent, "ok", TokenUsage::new(100, 50), Duration::ZERO);
        ctx.flow.record_response(phase, &response, 1);
    }

    #[test]
    fn test_completed_report() {
        let mut ctx = context();
        respond(&mut ctx, InvestigationPhase::TraceAnalysis, "trace_specialist");
        respond(&mut ctx, InvestigationPhase::ServiceAnalysis, "service_specialist");
        ctx.flow.complete();

        let report = assemble(&ctx, RunOutcome::Completed, RunTimings::start().finish());

        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.run_id, "run-42");
        assert_eq!(report.affected_resources[0].health_status, HealthStatus::Unknown);
        assert_eq!(report.summary.flow_control.unique_agent_count, 2);
        assert_eq!(report.summary.flow_control.handoff_count, 2);
        assert!(!report.summary.flow_control.early_termination);
        assert_eq!(report.summary.cost_control.token_usage.total, 150);
        assert_eq!(report.timeline.len(), 2);
        assert_eq!(report.timeline[0].event, "handoff");
        assert_eq!(report.timeline[1].event, "phase_transition");
        assert_eq!(
            report.facts.iter().filter(|f| f.source == FLOW_CONTROL_SOURCE).count(),
            2
        );
        assert!(report.summary.error.is_none());
    }

    #[test]
    fn test_early_termination_report() {
        let mut ctx = context();
        respond(&mut ctx, InvestigationPhase::TraceAnalysis, "a");
        let reason = TerminationReason::TokenLimit {
            used: 2_000,
            max: 1_000,
        };
        let report = assemble(
            &ctx,
            RunOutcome::EarlyTermination(reason),
            RunTimings::start(),
        );

        assert_eq!(report.status, ReportStatus::TokenLimited);
        assert_eq!(
            report.affected_resources[0].health_status,
            HealthStatus::NotAnalyzed
        );
        assert!(report.summary.flow_control.early_termination);
        assert!(report
            .summary
            .flow_control
            .termination_reason
            .as_deref()
            .unwrap()
            .contains("token limit exceeded"));
        assert!(report
            .facts
            .iter()
            .any(|f| f.content.starts_with("Investigation terminated early")));
    }

    #[test]
    fn test_failed_report_carries_error() {
        let ctx = context();
        let report = assemble(
            &ctx,
            RunOutcome::Failed("substrate unavailable".to_string()),
            RunTimings::start(),
        );

        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.summary.error.as_deref(), Some("substrate unavailable"));
        assert_eq!(report.severity.level, Severity::Unknown);
        assert_eq!(report.summary.fact_count, report.facts.len());
    }
}
