use crate::model::{Fact, InvestigationPhase, Relationship, Resource, TokenUsage};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Terminal status of an investigation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    Failed,
    CostLimited,
    TokenLimited,
    HandoffLimited,
    RepetitiveHandoffDetected,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
            ReportStatus::CostLimited => "cost_limited",
            ReportStatus::TokenLimited => "token_limited",
            ReportStatus::HandoffLimited => "handoff_limited",
            ReportStatus::RepetitiveHandoffDetected => "repetitive_handoff_detected",
        }
    }

    /// True for the budget and safety exits that may carry partial answers.
    pub fn is_early_termination(self) -> bool {
        !matches!(self, ReportStatus::Completed | ReportStatus::Failed)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    NotAnalyzed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedResource {
    pub resource: Resource,
    pub health_status: HealthStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityAssessment {
    pub level: Severity,
    pub rationale: String,
    pub issue_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub from_phase: InvestigationPhase,
    pub to_phase: InvestigationPhase,
    pub agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowControlSnapshot {
    pub final_phase: InvestigationPhase,
    pub unique_agents: Vec<String>,
    pub unique_agent_count: usize,
    pub handoff_count: usize,
    pub phases_completed: BTreeMap<InvestigationPhase, bool>,
    pub early_termination: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostControlSnapshot {
    pub token_usage: TokenUsage,
    pub cost_estimate: f64,
    pub max_cost: f64,
    pub max_tokens: u64,
    pub max_handoffs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub trace_ids: Vec<String>,
    pub resource_count: usize,
    pub relationship_count: usize,
    pub fact_count: usize,
    pub parse_misses: usize,
    pub flow_control: FlowControlSnapshot,
    pub cost_control: CostControlSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationReport {
    pub run_id: String,
    pub status: ReportStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub facts: Vec<Fact>,
    pub affected_resources: Vec<AffectedResource>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub severity: SeverityAssessment,
    /// Delegated content from the root-cause phase, opaque to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause_analysis: Option<Value>,
    pub timeline: Vec<TimelineEvent>,
    pub summary: ReportSummary,
}

impl InvestigationReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize InvestigationReport to JSON")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize InvestigationReport to YAML")
    }
}

impl fmt::Display for InvestigationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Investigation {} [{}]", self.run_id, self.status)?;
        writeln!(
            f,
            "  Duration: {}ms, severity: {:?}",
            self.duration_ms, self.severity.level
        )?;
        if let Some(error) = &self.summary.error {
            writeln!(f, "  Error: {}", error)?;
        }
        if let Some(reason) = &self.summary.flow_control.termination_reason {
            writeln!(f, "  Stopped early: {}", reason)?;
        }

        writeln!(f, "  Resources ({}):", self.affected_resources.len())?;
        for affected in &self.affected_resources {
            writeln!(
                f,
                "    - {} ({:?})",
                affected.resource.label(),
                affected.health_status
            )?;
        }

        writeln!(f, "  Facts ({}):", self.facts.len())?;
        for fact in &self.facts {
            writeln!(
                f,
                "    - [{:.2}] {}: {}",
                fact.confidence, fact.source, fact.content
            )?;
        }

        let cost = &self.summary.cost_control;
        write!(
            f,
            "  Tokens: {} (in {}, out {}), estimated cost: ${:.4}",
            cost.token_usage.total, cost.token_usage.input, cost.token_usage.output, cost.cost_estimate
        )
    }
}
