use regex::Regex;
use rootscope_agents::ProbeResult;
use rootscope_core::model::FACT_PLACEHOLDER;
use rootscope_core::{Fact, FlowLimits, Resource};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use tracing::debug;

const RESERVED_KEYS: [&str; 3] = ["content", "confidence", "metadata"];
const SUMMARY_CONFIDENCE: f64 = 0.5;
const PROBE_ERROR_CONFIDENCE: f64 = 0.6;

/// Keyword triggers for unstructured output: (trigger, needles, content, confidence)
const KEYWORD_TRIGGERS: [(&str, &[&str], &str, f64); 4] = [
    (
        "error",
        &["error"],
        "Agent output reports errors",
        0.6,
    ),
    (
        "permission",
        &["permission", "access denied"],
        "Agent output reports permission or access problems",
        0.7,
    ),
    (
        "timeout",
        &["timeout"],
        "Agent output reports timeouts",
        0.6,
    ),
    (
        "throttling",
        &["throttl"],
        "Agent output reports throttling",
        0.7,
    ),
];

/// Turns heterogeneous probe and agent output into canonical [`Fact`]s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactNormalizer {
    default_confidence: f64,
    preview_len: usize,
}

impl Default for FactNormalizer {
    fn default() -> Self {
        Self::new(0.7, 200)
    }
}

impl FactNormalizer {
    pub fn new(default_confidence: f64, preview_len: usize) -> Self {
        Self {
            default_confidence: clamp_unit(default_confidence),
            preview_len,
        }
    }

    pub fn from_limits(limits: &FlowLimits) -> Self {
        Self::new(limits.default_confidence, limits.content_preview_len)
    }

    pub fn default_confidence(&self) -> f64 {
        self.default_confidence
    }

    /// Normalizes a single item, a list, a dict or a string.
    ///
    /// A dict carrying a `facts` array and no `content` is treated as a
    /// container and its elements are normalized instead.
    pub fn normalize(&self, raw: &Value, source: &str) -> Vec<Fact> {
        match raw {
            Value::Array(items) => items
                .iter()
                .flat_map(|item| self.normalize(item, source))
                .collect(),
            Value::Object(map) => match map.get("facts") {
                Some(Value::Array(items)) if !map.contains_key("content") => items
                    .iter()
                    .flat_map(|item| self.normalize(item, source))
                    .collect(),
                _ => vec![self.from_dict(map, source)],
            },
            Value::String(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![Fact::new(source, text, self.default_confidence)]
                }
            }
            Value::Number(_) | Value::Bool(_) => {
                vec![Fact::new(source, raw.to_string(), self.default_confidence)]
            }
            Value::Null => Vec::new(),
        }
    }

    fn from_dict(&self, map: &Map<String, Value>, source: &str) -> Fact {
        let mut metadata = match map.get("metadata") {
            Some(Value::Object(inner)) => inner.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(other) => {
                let mut wrapped = Map::new();
                wrapped.insert("value".to_string(), other.clone());
                wrapped
            }
        };
        for (key, value) in map {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                metadata.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let content = match map.get("content") {
            Some(value) => coerce_to_string(value),
            None => String::new(),
        };
        let content = if content.is_empty() {
            self.synthesize_content(&metadata)
        } else {
            content
        };

        let confidence = clamp_confidence(map.get("confidence"), self.default_confidence);
        Fact::new(source, content, confidence).with_metadata_map(metadata)
    }

    fn synthesize_content(&self, metadata: &Map<String, Value>) -> String {
        if metadata.is_empty() {
            return FACT_PLACEHOLDER.to_string();
        }
        let rendered = Value::Object(metadata.clone()).to_string();
        format!("Metadata: {}", truncate_chars(&rendered, self.preview_len))
    }

    /// Scans free text for embedded fact collections, falling back to a
    /// summary fact plus keyword-triggered facts.
    ///
    /// Non-empty text always yields at least one fact.
    pub fn from_text(&self, text: &str, source: &str) -> Vec<Fact> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let facts: Vec<Fact> = embedded_fact_collections(text)
            .iter()
            .flat_map(|collection| self.normalize(collection, source))
            .collect();
        if !facts.is_empty() {
            return facts;
        }

        debug!(source, "No structured facts in output, using keyword scan");
        let length = text.chars().count();
        let mut facts = vec![Fact::new(
            source,
            format!(
                "Agent produced {} characters of unstructured output: {}",
                length,
                truncate_chars(text.trim(), self.preview_len)
            ),
            SUMMARY_CONFIDENCE,
        )
        .with_metadata("output_length", json!(length))
        .with_metadata("summary", json!(true))];

        let lowered = text.to_lowercase();
        for (trigger, needles, content, confidence) in KEYWORD_TRIGGERS {
            if needles.iter().any(|needle| lowered.contains(needle)) {
                facts.push(
                    Fact::new(source, content, confidence)
                        .with_metadata("keyword_trigger", json!(trigger))
                        .with_metadata("potential_issue", json!(true)),
                );
            }
        }
        facts
    }

    /// Facts from one probe result. Probe failures become issue facts.
    pub fn from_probe(&self, resource: &Resource, result: &ProbeResult) -> Vec<Fact> {
        let source = format!("probe:{}", resource.resource_type);
        let label = resource.label();

        match result {
            ProbeResult::Success { payload } => {
                let embedded = match payload.get("facts") {
                    Some(facts @ Value::Array(_)) => self.normalize(facts, &source),
                    _ => Vec::new(),
                };
                let facts = if embedded.is_empty() {
                    vec![Fact::new(
                        &source,
                        format!(
                            "Probe of {} returned: {}",
                            label,
                            truncate_chars(&payload.to_string(), self.preview_len)
                        ),
                        self.default_confidence,
                    )]
                } else {
                    embedded
                };
                facts
                    .into_iter()
                    .map(|fact| fact.with_metadata("resource", json!(label)))
                    .collect()
            }
            ProbeResult::Error { message } => vec![Fact::new(
                source,
                format!("Probe of {} failed: {}", label, message),
                PROBE_ERROR_CONFIDENCE,
            )
            .with_metadata("resource", json!(label))
            .with_metadata("probe_error", json!(true))
            .with_metadata("potential_issue", json!(true))],
        }
    }
}

/// Reads a confidence value: numbers and numeric strings are clamped into
/// `[0, 1]`; anything else yields `default`.
///
/// An out-of-range number keeps its direction: `1.7` becomes `1.0` and `-0.2`
/// becomes `0.0`. Only missing, non-numeric and non-finite values fall back to
/// `default`.
pub fn clamp_confidence(value: Option<&Value>, default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => clamp_unit(default),
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max).collect();
    truncated.push_str("...");
    truncated
}

fn fenced_block_regex() -> Option<&'static Regex> {
    static FENCED: OnceLock<Option<Regex>> = OnceLock::new();
    FENCED
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\n?(.*?)```").ok())
        .as_ref()
}

/// JSON objects with a `facts` key, from fenced blocks first and then from
/// bare brace-balanced objects in the remaining prose.
fn embedded_fact_collections(text: &str) -> Vec<Value> {
    let mut found = Vec::new();
    let mut remainder = text.to_string();

    if let Some(re) = fenced_block_regex() {
        for captures in re.captures_iter(text) {
            if let Some(body) = captures.get(1) {
                if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                    if value.get("facts").is_some() {
                        found.push(value);
                    }
                }
            }
        }
        remainder = re.replace_all(text, " ").into_owned();
    }

    for candidate in balanced_objects(&remainder) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if value.get("facts").is_some() {
                found.push(value);
            }
        }
    }
    found
}

/// Top-level `{...}` spans, honoring string literals and escapes.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(index);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        spans.push(&text[begin..=index]);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootscope_core::{DiscoverySource, ResourceType};
    use yare::parameterized;

    fn normalizer() -> FactNormalizer {
        FactNormalizer::default()
    }

    #[parameterized(
        in_range = { json!(0.42), 0.42 },
        above = { json!(1.7), 1.0 },
        below = { json!(-3), 0.0 },
        numeric_string = { json!("0.9"), 0.9 },
        text = { json!("high"), 0.7 },
        null = { Value::Null, 0.7 },
        boolean = { json!(true), 0.7 },
    )]
    fn test_clamp_confidence(raw: Value, expected: f64) {
        assert_eq!(clamp_confidence(Some(&raw), 0.7), expected);
    }

    #[test]
    fn test_missing_confidence_uses_default() {
        assert_eq!(clamp_confidence(None, 0.3), 0.3);
    }

    #[test]
    fn test_dict_with_empty_content_synthesizes_from_metadata() {
        let facts = normalizer().normalize(&json!({"content": "", "metadata": {"x": 1}}), "probe");
        assert_eq!(facts.len(), 1);
        assert!(facts[0].content.contains("\"x\":1"));
        assert_eq!(facts[0].metadata.get("x"), Some(&json!(1)));
        assert_eq!(facts[0].source, "probe");
    }

    #[test]
    fn test_dict_without_anything_uses_placeholder() {
        let facts = normalizer().normalize(&json!({"content": "   "}), "agent");
        assert_eq!(facts[0].content, FACT_PLACEHOLDER);
        assert_eq!(facts[0].confidence, 0.7);
    }

    #[test]
    fn test_synthesized_content_is_bounded() {
        let long = "y".repeat(500);
        let facts = FactNormalizer::new(0.7, 32).normalize(&json!({"metadata": {"blob": long}}), "p");
        assert!(facts[0].content.chars().count() <= "Metadata: ".len() + 32 + 3);
    }

    #[test]
    fn test_non_string_content_is_coerced() {
        let facts = normalizer().normalize(&json!({"content": 503, "confidence": 0.8}), "agent");
        assert_eq!(facts[0].content, "503");
        assert_eq!(facts[0].confidence, 0.8);
    }

    #[test]
    fn test_lists_and_strings() {
        let facts = normalizer().normalize(
            &json!(["  Lambda timed out  ", "", {"content": "Queue backlog growing"}, null]),
            "agent",
        );
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].content, "Lambda timed out");
        assert_eq!(facts[1].content, "Queue backlog growing");
    }

    #[test]
    fn test_facts_container_is_unwrapped() {
        let facts = normalizer().normalize(
            &json!({"facts": [{"content": "a"}, {"content": "b"}], "summary": "x"}),
            "agent",
        );
        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn test_text_with_fenced_block() {
        let text = "Here is what I found:\n```json\n{\"facts\": [{\"content\": \"DynamoDB throttled writes\", \"confidence\": 0.85}]}\n```\nDone.";
        let facts = normalizer().from_text(text, "service_specialist");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "DynamoDB throttled writes");
        assert_eq!(facts[0].confidence, 0.85);
    }

    #[test]
    fn test_text_with_bare_object() {
        let text = r#"Summary {"facts": [{"content": "brace } inside string"}]} trailing"#;
        let facts = normalizer().from_text(text, "agent");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "brace } inside string");
    }

    #[test]
    fn test_prose_yields_summary_and_keyword_facts() {
        let text = "The function hit a Timeout and later got AccessDenied... Access denied again, and requests were throttled.";
        let facts = normalizer().from_text(text, "agent");
        assert!(facts[0].metadata.contains_key("output_length"));

        let triggers: Vec<&str> = facts
            .iter()
            .filter_map(|f| f.metadata.get("keyword_trigger").and_then(Value::as_str))
            .collect();
        assert_eq!(triggers, vec!["permission", "timeout", "throttling"]);
        assert!(facts.iter().skip(1).all(Fact::is_issue));
    }

    #[test]
    fn test_plain_prose_yields_one_fact() {
        let facts = normalizer().from_text("Everything looks healthy.", "agent");
        assert_eq!(facts.len(), 1);
        assert!(!facts[0].is_issue());
        assert!(normalizer().from_text("  \n ", "agent").is_empty());
    }

    #[test]
    fn test_probe_results() {
        let resource = Resource::new(ResourceType::Lambda, "checkout", DiscoverySource::Trace);

        let failed = normalizer().from_probe(&resource, &ProbeResult::error("AccessDenied"));
        assert_eq!(failed.len(), 1);
        assert!(failed[0].is_issue());
        assert_eq!(failed[0].source, "probe:lambda");
        assert!(failed[0].content.contains("AccessDenied"));

        let ok = normalizer().from_probe(
            &resource,
            &ProbeResult::Success {
                payload: json!({"facts": [{"content": "Concurrency limit reached", "potential_issue": true}]}),
            },
        );
        assert_eq!(ok.len(), 1);
        assert!(ok[0].is_issue());
        assert_eq!(ok[0].metadata.get("resource"), Some(&json!("lambda:checkout")));

        let summary = normalizer().from_probe(
            &resource,
            &ProbeResult::Success {
                payload: json!({"runtime": "python3.12"}),
            },
        );
        assert!(summary[0].content.contains("python3.12"));
    }
}
