use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Decoded X-Ray segment or subsegment document.
///
/// Only the fields the extractor reads are typed; everything else in the
/// document is ignored. Subsegments stay raw so that each one is decoded on
/// its own through [`SegmentDocument::children`].
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentDocument {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub origin: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub resource_arn: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub namespace: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub aws: Option<Map<String, Value>>,
    #[serde(default)]
    pub http: Option<Value>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub error: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub fault: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub throttle: bool,
    #[serde(default, deserialize_with = "lenient_list")]
    subsegments: Vec<Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// X-Ray ids are hex strings; some emitters write numeric ids.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_object<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Map<String, Value>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

/// `true`, `"true"` and non-zero numbers set a flag; anything else clears it.
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(set) => set,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

impl SegmentDocument {
    /// Decodes a `Document` field: the X-Ray wire format embeds it as a JSON
    /// string, fixtures often carry it already decoded.
    pub fn decode(document: &Value) -> Result<Self, String> {
        match document {
            Value::String(raw) => serde_json::from_str(raw).map_err(|e| e.to_string()),
            Value::Object(_) => Self::deserialize(document).map_err(|e| e.to_string()),
            Value::Null => Err("segment has no Document".to_string()),
            other => Err(format!("unexpected Document type: {}", json_kind(other))),
        }
    }

    /// Nested subsegments, each decoded independently. A failure carries the
    /// child's id when it has one.
    pub fn children(&self) -> impl Iterator<Item = (Option<&str>, Result<SegmentDocument, String>)> + '_ {
        self.subsegments.iter().map(|child| {
            let id = child.get("id").and_then(Value::as_str);
            (id, SegmentDocument::decode(child))
        })
    }

    pub fn child_count(&self) -> usize {
        self.subsegments.len()
    }

    pub fn aws_str(&self, key: &str) -> Option<&str> {
        self.aws
            .as_ref()?
            .get(key)?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    pub fn operation(&self) -> Option<&str> {
        self.aws_str("operation")
    }

    pub fn request_url(&self) -> Option<&str> {
        self.http.as_ref()?.get("request")?.get("url")?.as_str()
    }

    pub fn is_aws_call(&self) -> bool {
        self.namespace.as_deref() == Some("aws")
    }

    /// Error, fault and throttle flags plus the AWS operation, as metadata.
    pub fn status_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        for (flag, set) in [
            ("error", self.error),
            ("fault", self.fault),
            ("throttle", self.throttle),
        ] {
            if set {
                metadata.insert(flag.to_string(), Value::Bool(true));
            }
        }
        if let Some(operation) = self.operation() {
            metadata.insert("operation".to_string(), Value::String(operation.to_string()));
        }
        metadata
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_embedded_string() {
        let raw = json!(r#"{"id": "a1", "name": "orders-api/prod", "origin": "AWS::ApiGateway::Stage"}"#);
        let doc = SegmentDocument::decode(&raw).unwrap();
        assert_eq!(doc.name, "orders-api/prod");
        assert_eq!(doc.origin.as_deref(), Some("AWS::ApiGateway::Stage"));
        assert_eq!(doc.child_count(), 0);
    }

    #[test]
    fn test_decode_object_with_subsegments() {
        let raw = json!({
            "id": "a1",
            "name": "checkout",
            "fault": true,
            "subsegments": [{
                "id": "b2",
                "name": "DynamoDB",
                "namespace": "aws",
                "aws": {"operation": "PutItem", "table_name": "orders"}
            }]
        });
        let doc = SegmentDocument::decode(&raw).unwrap();
        let (id, sub) = doc.children().next().unwrap();
        let sub = sub.unwrap();
        assert_eq!(id, Some("b2"));
        assert!(sub.is_aws_call());
        assert_eq!(sub.aws_str("table_name"), Some("orders"));
        assert_eq!(doc.status_metadata().get("fault"), Some(&json!(true)));
    }

    #[test]
    fn test_decode_failures() {
        assert!(SegmentDocument::decode(&json!("{not json")).is_err());
        assert!(SegmentDocument::decode(&json!({"name": 42})).is_err());
        assert!(SegmentDocument::decode(&Value::Null).is_err());
        assert!(SegmentDocument::decode(&json!([1, 2]))
            .unwrap_err()
            .contains("array"));
    }

    #[test]
    fn test_children_decode_independently() {
        let doc = SegmentDocument::decode(&json!({
            "id": "s1",
            "name": "checkout",
            "subsegments": [
                {"id": "b1", "name": 42},
                "not a document",
                {"id": "b3", "name": "SQS", "namespace": "aws"}
            ]
        }))
        .unwrap();

        let children: Vec<_> = doc.children().collect();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].0, Some("b1"));
        assert!(children[0].1.is_err());
        assert!(children[1].1.is_err());
        assert_eq!(children[2].1.as_ref().unwrap().name, "SQS");
    }

    #[test]
    fn test_loose_field_types_do_not_fail_decoding() {
        let doc = SegmentDocument::decode(&json!({
            "id": 7,
            "name": null,
            "origin": 3,
            "aws": "n/a",
            "error": "true",
            "fault": 1,
            "throttle": null,
            "subsegments": null
        }))
        .unwrap();

        assert_eq!(doc.id.as_deref(), Some("7"));
        assert_eq!(doc.name, "");
        assert!(doc.origin.is_none());
        assert!(doc.aws.is_none());
        assert!(doc.error);
        assert!(doc.fault);
        assert!(!doc.throttle);
        assert_eq!(doc.child_count(), 0);
    }

    #[test]
    fn test_request_url() {
        let doc = SegmentDocument::decode(&json!({
            "name": "STEPFUNCTIONS",
            "http": {"request": {"url": "https://sync-states.us-east-1.amazonaws.com/?Action=StartSyncExecution"}}
        }))
        .unwrap();
        assert!(doc.request_url().unwrap().contains("StartSyncExecution"));
    }
}
