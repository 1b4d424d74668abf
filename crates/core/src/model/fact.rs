use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content used when a producer supplied neither content nor metadata
pub const FACT_PLACEHOLDER: &str = "No content provided";

/// An atomic, attributable observation used as evidence.
///
/// `content` is never empty and `confidence` always lies in `[0.0, 1.0]`;
/// both are enforced at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub source: String,
    pub content: String,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Fact {
    pub fn new(source: impl Into<String>, content: impl Into<String>, confidence: f64) -> Self {
        let content = content.into();
        let content = if content.trim().is_empty() {
            FACT_PLACEHOLDER.to_string()
        } else {
            content
        };

        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            source: source.into(),
            content,
            confidence,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_metadata_map(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// True when the producer flagged this fact as pointing at a problem.
    pub fn is_issue(&self) -> bool {
        self.metadata
            .get("potential_issue")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
