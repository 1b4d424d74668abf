use crate::context::InvestigationContext;
use rootscope_core::Fact;

const MAX_FACTS_IN_PROMPT: usize = 40;

pub(crate) fn resource_lines(context: &InvestigationContext) -> String {
    if context.graph.resources.is_empty() {
        return "- (no resources discovered)".to_string();
    }
    context
        .graph
        .resources
        .iter()
        .map(|r| {
            let mut line = format!("- {}", r.label());
            if let Some(stage) = &r.stage {
                line.push_str(&format!(" stage={}", stage));
            }
            if let Some(execution_id) = &r.execution_id {
                line.push_str(&format!(" execution={}", execution_id));
            }
            if !r.metadata.is_empty() {
                line.push_str(&format!(" {}", serde_json::Value::Object(r.metadata.clone())));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn relationship_lines(context: &InvestigationContext) -> String {
    if context.graph.relationships.is_empty() {
        return "- (none)".to_string();
    }
    context
        .graph
        .relationships
        .iter()
        .map(|r| format!("- {} --{:?}--> {}", r.from, r.kind, r.to))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The latest facts, in accumulation order.
pub(crate) fn fact_lines(facts: &[Fact]) -> String {
    if facts.is_empty() {
        return "- (no facts yet)".to_string();
    }
    let skip = facts.len().saturating_sub(MAX_FACTS_IN_PROMPT);
    facts[skip..]
        .iter()
        .map(|f| format!("- [{:.2}] ({}) {}", f.confidence, f.source, f.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn symptom_line(context: &InvestigationContext) -> String {
    match &context.request.symptom {
        Some(symptom) => format!("Reported symptom: {}", symptom),
        None => "Reported symptom: (none given)".to_string(),
    }
}
