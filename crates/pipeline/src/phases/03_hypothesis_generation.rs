use super::prompt::{fact_lines, relationship_lines, symptom_line};
use crate::context::InvestigationContext;
use crate::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use rootscope_core::InvestigationPhase;

pub struct HypothesisGenerationPhase;

#[async_trait]
impl WorkflowPhase for HypothesisGenerationPhase {
    fn phase(&self) -> InvestigationPhase {
        InvestigationPhase::HypothesisGeneration
    }

    fn build_prompt(&self, context: &InvestigationContext) -> String {
        let issues = context.facts.iter().filter(|f| f.is_issue()).count();

        format!(
            r#"Generate ranked hypotheses that explain the incident.

{}
Evidence ({} facts, {} flagged as potential issues):
{}

Call graph:
{}

Each hypothesis must cite the facts that support it. Prefer hypotheses that
explain every flagged issue over ones that explain a single fact.

Respond with JSON:
{{
  "facts": [
    {{"content": "hypothesis", "confidence": 0.0-1.0, "metadata": {{"hypothesis": true, "supporting_facts": ["..."]}}}}
  ]
}}
"#,
            symptom_line(context),
            context.facts.len(),
            issues,
            fact_lines(&context.facts),
            relationship_lines(context),
        )
    }
}
