//! Output formatting for reports, resource graphs and configuration
//!
//! JSON and YAML are the serialized forms of the engine types; the human
//! format is a condensed terminal view.

use anyhow::{Context, Result};
use rootscope_core::output::schema::Severity;
use rootscope_core::{InvestigationReport, RootscopeConfig};
use rootscope_pipeline::ResourceGraph;
use serde_json::Value;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// How many facts the human view lists before summarizing the rest
const HUMAN_FACT_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_report(&self, report: &InvestigationReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => report.to_json_pretty(),
            OutputFormat::Yaml => report.to_yaml(),
            OutputFormat::Human => Ok(self.format_report_human(report)),
        }
    }

    pub fn format_graph(&self, graph: &ResourceGraph) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(graph)
                .context("Failed to serialize resource graph to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(graph).context("Failed to serialize resource graph to YAML")
            }
            OutputFormat::Human => Ok(self.format_graph_human(graph)),
        }
    }

    pub fn format_config(&self, config: &RootscopeConfig) -> Result<String> {
        let config_map = config.to_display_map();
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&config_map)
                .context("Failed to serialize config to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(&config_map).context("Failed to serialize config to YAML")
            }
            OutputFormat::Human => {
                let mut output = String::new();
                output.push_str("rootscope Configuration\n");
                output.push_str(RULE);
                output.push_str("\n\n");
                for (key, value) in &config_map {
                    output.push_str(&format!("  {:<22} {}\n", key, value));
                }
                Ok(output)
            }
        }
    }

    fn format_report_human(&self, report: &InvestigationReport) -> String {
        let mut output = String::new();

        let marker = match report.severity.level {
            Severity::High | Severity::Critical => "\u{2717}",
            Severity::Medium => "\u{26A0}",
            _ => "\u{2713}",
        };
        output.push_str(&format!("{} Investigation {}\n", marker, report.run_id));
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Status:    {}\n", report.status));
        output.push_str(&format!(
            "Severity:  {:?} ({})\n",
            report.severity.level, report.severity.rationale
        ));
        output.push_str(&format!("Duration:  {}ms\n", report.duration_ms));
        if let Some(error) = &report.summary.error {
            output.push_str(&format!("Error:     {}\n", error));
        }
        if let Some(reason) = &report.summary.flow_control.termination_reason {
            output.push_str(&format!("Stopped:   {}\n", reason));
        }
        output.push('\n');

        if let Some(root_cause) = &report.root_cause_analysis {
            output.push_str("Root Cause:\n");
            output.push_str(&format!("  {}\n\n", root_cause_text(root_cause)));
        }

        output.push_str(&format!(
            "Resources ({}):\n",
            report.affected_resources.len()
        ));
        for (i, affected) in report.affected_resources.iter().enumerate() {
            let connector = if i + 1 == report.affected_resources.len() {
                "\u{2514}\u{2500}"
            } else {
                "\u{251C}\u{2500}"
            };
            output.push_str(&format!(
                "{} {} [{:?}]\n",
                connector,
                affected.resource.label(),
                affected.health_status
            ));
        }
        output.push('\n');

        output.push_str(&format!("Facts ({}):\n", report.facts.len()));
        for fact in report.facts.iter().take(HUMAN_FACT_LIMIT) {
            let flag = if fact.is_issue() { "!" } else { "-" };
            output.push_str(&format!(
                "  {} [{:.2}] {}: {}\n",
                flag, fact.confidence, fact.source, fact.content
            ));
        }
        if report.facts.len() > HUMAN_FACT_LIMIT {
            output.push_str(&format!(
                "  ... {} more (use --format json for all)\n",
                report.facts.len() - HUMAN_FACT_LIMIT
            ));
        }
        output.push('\n');

        let flow = &report.summary.flow_control;
        let cost = &report.summary.cost_control;
        output.push_str("Flow Control:\n");
        output.push_str(&format!(
            "\u{251C}\u{2500} Agents:   {} ({})\n",
            flow.unique_agent_count,
            flow.unique_agents.join(", ")
        ));
        output.push_str(&format!(
            "\u{251C}\u{2500} Handoffs: {}/{}\n",
            flow.handoff_count, cost.max_handoffs
        ));
        output.push_str(&format!(
            "\u{251C}\u{2500} Tokens:   {}/{}\n",
            cost.token_usage.total, cost.max_tokens
        ));
        output.push_str(&format!(
            "\u{2514}\u{2500} Cost:     ${:.4}/${:.4}\n",
            cost.cost_estimate, cost.max_cost
        ));

        output
    }

    fn format_graph_human(&self, graph: &ResourceGraph) -> String {
        let mut output = String::new();
        output.push_str("Resource Graph\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Traces: {}\n\n", graph.trace_ids.join(", ")));

        output.push_str(&format!("Resources ({}):\n", graph.resources.len()));
        for resource in &graph.resources {
            output.push_str(&format!("  {}", resource.label()));
            if let Some(stage) = &resource.stage {
                output.push_str(&format!(" stage={}", stage));
            }
            if let Some(execution_id) = &resource.execution_id {
                output.push_str(&format!(" execution={}", execution_id));
            }
            output.push('\n');
        }

        output.push_str(&format!("\nRelationships ({}):\n", graph.relationships.len()));
        for rel in &graph.relationships {
            output.push_str(&format!("  {} --{:?}--> {}\n", rel.from, rel.kind, rel.to));
        }

        if !graph.parse_misses.is_empty() {
            output.push_str(&format!(
                "\n\u{26A0} Undecodable segments ({}):\n",
                graph.parse_misses.len()
            ));
            for miss in &graph.parse_misses {
                output.push_str(&format!(
                    "  {} / {}: {}\n",
                    miss.trace_id, miss.segment_id, miss.error
                ));
            }
        }

        output
    }
}

fn root_cause_text(root_cause: &Value) -> String {
    match root_cause {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("root_cause")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| root_cause.to_string()),
        other => other.to_string(),
    }
}
