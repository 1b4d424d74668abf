use crate::extraction::resource_from_arn;
use regex::Regex;
use rootscope_core::{DiscoverySource, Resource, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Investigation request is empty")]
    Empty,

    #[error("Unknown resource type '{0}'")]
    UnknownResourceType(String),

    #[error("Unrecognized investigation request: {0}")]
    Unrecognized(String),
}

/// A resource the operator explicitly asked about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl TargetSpec {
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            name: name.into(),
            region: None,
            metadata: Map::new(),
        }
    }

    pub fn to_resource(&self) -> Resource {
        let mut resource = Resource::new(
            self.resource_type,
            self.name.clone(),
            DiscoverySource::ExplicitTarget,
        );
        if let Some(region) = &self.region {
            resource = resource.with_region(region.clone());
        }
        resource.metadata = self.metadata.clone();
        resource
    }

    fn from_arn(arn: &str) -> Option<Self> {
        let resource = resource_from_arn(arn)?;
        let mut metadata = Map::new();
        metadata.insert("arn".to_string(), Value::String(arn.to_string()));
        Some(Self {
            resource_type: resource.resource_type,
            name: resource.name,
            region: resource.region,
            metadata,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestigationRequest {
    #[serde(default)]
    pub trace_ids: Vec<String>,
    #[serde(default)]
    pub primary_targets: Vec<TargetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptom: Option<String>,
}

fn trace_id_regex() -> Option<&'static Regex> {
    static TRACE_ID: OnceLock<Option<Regex>> = OnceLock::new();
    TRACE_ID
        .get_or_init(|| Regex::new(r"^1-[0-9a-fA-F]{8}-[0-9a-fA-F]{24}$").ok())
        .as_ref()
}

/// True for X-Ray trace ids such as `1-5f84c7a1-3b2c4d5e6f708192a3b4c5d6`.
pub fn is_trace_id(candidate: &str) -> bool {
    trace_id_regex().is_some_and(|re| re.is_match(candidate.trim()))
}

impl InvestigationRequest {
    pub fn for_trace(trace_id: impl Into<String>) -> Self {
        Self {
            trace_ids: vec![trace_id.into()],
            ..Self::default()
        }
    }

    pub fn for_target(target: TargetSpec) -> Self {
        Self {
            primary_targets: vec![target],
            ..Self::default()
        }
    }

    pub fn for_symptom(symptom: impl Into<String>) -> Self {
        Self {
            symptom: Some(symptom.into()),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.trace_ids.is_empty()
            && self.primary_targets.is_empty()
            && self.symptom.as_deref().map_or(true, |s| s.trim().is_empty())
    }

    /// Region for the run: explicit, else the first target's, else `fallback`.
    pub fn effective_region(&self, fallback: &str) -> String {
        self.region
            .clone()
            .or_else(|| self.primary_targets.iter().find_map(|t| t.region.clone()))
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Accepts the canonical shape plus the legacy ones: `{trace_id}`,
    /// `{resource_name, resource_type}`, `{resource: {...}}`,
    /// `{target: "<arn>"}` and a bare string (trace id, ARN or symptom text).
    pub fn from_value(value: &Value) -> Result<Self, RequestError> {
        let request = match value {
            Value::String(text) => Self::from_text(text),
            Value::Object(map) => Self::from_map(map)?,
            Value::Null => return Err(RequestError::Empty),
            other => return Err(RequestError::Unrecognized(other.to_string())),
        };

        if request.is_empty() {
            return Err(RequestError::Empty);
        }
        Ok(request)
    }

    fn from_text(text: &str) -> Self {
        let text = text.trim();
        if is_trace_id(text) {
            return Self::for_trace(text);
        }
        if let Some(target) = TargetSpec::from_arn(text) {
            return Self::for_target(target);
        }
        if text.is_empty() {
            return Self::default();
        }
        Self::for_symptom(text)
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, RequestError> {
        let mut request = if map.contains_key("trace_ids") || map.contains_key("primary_targets") {
            Self::deserialize(Value::Object(map.clone()))
                .map_err(|e| RequestError::Unrecognized(e.to_string()))?
        } else {
            Self::default()
        };

        if let Some(trace_id) = string_field(map, "trace_id") {
            if !request.trace_ids.iter().any(|t| t == trace_id) {
                request.trace_ids.push(trace_id.to_string());
            }
        }

        if let Some(name) = string_field(map, "resource_name") {
            let type_name = string_field(map, "resource_type").unwrap_or("lambda");
            request.primary_targets.push(target(type_name, name, None)?);
        }

        if let Some(Value::Object(resource)) = map.get("resource") {
            let name = string_field(resource, "name").or_else(|| string_field(resource, "resource_name"));
            let type_name = string_field(resource, "type")
                .or_else(|| string_field(resource, "resource_type"))
                .unwrap_or("lambda");
            if let Some(name) = name {
                let region = string_field(resource, "region").map(str::to_string);
                request.primary_targets.push(target(type_name, name, region)?);
            }
        }

        if let Some(arn) = string_field(map, "target") {
            match TargetSpec::from_arn(arn) {
                Some(target) => request.primary_targets.push(target),
                None => return Err(RequestError::Unrecognized(format!("target '{}' is not a supported ARN", arn))),
            }
        }

        if request.region.is_none() {
            request.region = string_field(map, "region").map(str::to_string);
        }
        if request.symptom.is_none() {
            request.symptom = string_field(map, "symptom")
                .or_else(|| string_field(map, "description"))
                .map(str::to_string);
        }

        Ok(request)
    }
}

fn string_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn target(type_name: &str, name: &str, region: Option<String>) -> Result<TargetSpec, RequestError> {
    let resource_type: ResourceType = type_name
        .parse()
        .map_err(|_| RequestError::UnknownResourceType(type_name.to_string()))?;
    let mut spec = TargetSpec::new(resource_type, name);
    spec.region = region;
    Ok(spec)
}
