use super::prompt::{fact_lines, resource_lines, symptom_line};
use crate::context::InvestigationContext;
use crate::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use regex::Regex;
use rootscope_agents::SubstrateResponse;
use rootscope_core::InvestigationPhase;
use serde_json::Value;
use std::sync::OnceLock;

pub struct RootCauseAnalysisPhase;

fn fenced_block() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").ok())
        .as_ref()
}

/// The structured answer if the agent produced one, otherwise its raw text.
fn parse_root_cause(content: &str) -> Value {
    let trimmed = content.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    if let Some(captures) = fenced_block().and_then(|re| re.captures(trimmed)) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&captures[1]) {
            return value;
        }
    }
    Value::String(trimmed.to_string())
}

#[async_trait]
impl WorkflowPhase for RootCauseAnalysisPhase {
    fn phase(&self) -> InvestigationPhase {
        InvestigationPhase::RootCauseAnalysis
    }

    fn build_prompt(&self, context: &InvestigationContext) -> String {
        format!(
            r#"Determine the most likely root cause of the incident.

{}

Resources:
{}

Evidence and hypotheses:
{}

Pick the hypothesis best supported by the evidence, name the resource at
fault and recommend a remediation.

Respond with JSON:
{{
  "root_cause": "one sentence",
  "resource": "type:name",
  "confidence": 0.0-1.0,
  "remediation": ["step"],
  "facts": [
    {{"content": "conclusion", "confidence": 0.0-1.0, "metadata": {{"potential_issue": true}}}}
  ]
}}
"#,
            symptom_line(context),
            resource_lines(context),
            fact_lines(&context.facts),
        )
    }

    fn absorb(&self, context: &mut InvestigationContext, response: &SubstrateResponse) -> usize {
        let facts = context
            .normalizer
            .from_text(&response.content, &response.agent);
        let added = facts.len();
        context.facts.extend(facts);
        context.root_cause = Some(parse_root_cause(&response.content));
        added
    }
}
