use super::arn::resource_from_arn;
use super::graph::{ParseMiss, ResourceGraph};
use super::segment::SegmentDocument;
use rootscope_core::{DiscoverySource, RelationshipKind, Resource, ResourceType};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Trace payload has no `Traces` array")]
    MissingTraces,
}

/// Result of looking up a single trace in a payload
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Found(ResourceGraph),
    NotFound { trace_id: String },
}

const SYNC_EXECUTION_SUBSEGMENT: &str = "STEPFUNCTIONS";
const SYNC_EXECUTION_ACTION: &str = "StartSyncExecution";

/// Extracts resources and relationships from every trace in the payload.
pub fn extract(payload: &Value) -> Result<ResourceGraph, ExtractError> {
    let traces = traces(payload)?;
    let mut graph = ResourceGraph::new();
    for trace in traces {
        extract_trace(trace, &mut graph);
    }

    debug!(
        traces = graph.trace_ids.len(),
        resources = graph.resources.len(),
        relationships = graph.relationships.len(),
        parse_misses = graph.parse_misses.len(),
        "Extracted resource graph"
    );
    Ok(graph)
}

/// Extracts a single trace by id.
pub fn extract_for_trace(payload: &Value, trace_id: &str) -> Result<ExtractionOutcome, ExtractError> {
    let traces = traces(payload)?;
    let Some(trace) = traces
        .iter()
        .find(|t| t.get("Id").and_then(Value::as_str) == Some(trace_id))
    else {
        return Ok(ExtractionOutcome::NotFound {
            trace_id: trace_id.to_string(),
        });
    };

    let mut graph = ResourceGraph::new();
    extract_trace(trace, &mut graph);
    Ok(ExtractionOutcome::Found(graph))
}

fn traces(payload: &Value) -> Result<&Vec<Value>, ExtractError> {
    payload
        .get("Traces")
        .and_then(Value::as_array)
        .ok_or(ExtractError::MissingTraces)
}

fn extract_trace(trace: &Value, graph: &mut ResourceGraph) {
    let trace_id = trace
        .get("Id")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    if !graph.trace_ids.contains(&trace_id) {
        graph.trace_ids.push(trace_id.clone());
    }
    graph.total_duration_secs += trace.get("Duration").and_then(Value::as_f64).unwrap_or(0.0);

    let segments = trace
        .get("Segments")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for (index, segment) in segments.iter().enumerate() {
        let segment_id = segment
            .get("Id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index));

        let document = segment.get("Document").unwrap_or(&Value::Null);
        match SegmentDocument::decode(document) {
            Ok(doc) => extract_segment(&doc, &trace_id, &segment_id, graph),
            Err(error) => {
                warn!(
                    trace_id = %trace_id,
                    segment_id = %segment_id,
                    error = %error,
                    "Skipping undecodable segment"
                );
                graph.parse_misses.push(ParseMiss {
                    trace_id: trace_id.clone(),
                    segment_id,
                    error,
                });
            }
        }
    }
}

fn extract_segment(doc: &SegmentDocument, trace_id: &str, segment_id: &str, graph: &mut ResourceGraph) {
    let parent_key = segment_resource(doc).map(|resource| graph.insert_resource(resource));

    if parent_key.is_none() {
        debug!(segment_id, name = %doc.name, "Segment does not describe a known resource");
    }

    extract_children(doc, trace_id, segment_id, parent_key.as_deref(), graph);
}

/// Subsegments are attributed to the enclosing segment's resource at any depth.
fn extract_subsegment(
    sub: &SegmentDocument,
    trace_id: &str,
    segment_id: &str,
    parent_key: Option<&str>,
    graph: &mut ResourceGraph,
) {
    if let Some(target) = subsegment_target(sub) {
        let kind = RelationshipKind::from_operation(target.resource_type, sub.operation());
        let target_key = graph.insert_resource(target);
        if let Some(parent) = parent_key {
            let evidence = sub.id.as_deref().unwrap_or(segment_id);
            graph.insert_relationship(parent, &target_key, kind, Some(evidence));
        }
    }

    extract_children(sub, trace_id, segment_id, parent_key, graph);
}

/// A child that fails to decode becomes a parse miss; its siblings and
/// ancestors are unaffected.
fn extract_children(
    doc: &SegmentDocument,
    trace_id: &str,
    segment_id: &str,
    parent_key: Option<&str>,
    graph: &mut ResourceGraph,
) {
    for (index, (child_id, child)) in doc.children().enumerate() {
        match child {
            Ok(sub) => extract_subsegment(&sub, trace_id, segment_id, parent_key, graph),
            Err(error) => {
                let child_id = child_id
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}/#{}", segment_id, index));
                warn!(
                    trace_id,
                    segment_id = %child_id,
                    error = %error,
                    "Skipping undecodable subsegment"
                );
                graph.parse_misses.push(ParseMiss {
                    trace_id: trace_id.to_string(),
                    segment_id: child_id,
                    error,
                });
            }
        }
    }
}

/// Resource described by a top-level segment: ARN first, then origin plus name.
fn segment_resource(doc: &SegmentDocument) -> Option<Resource> {
    let resource = match doc.resource_arn.as_deref().and_then(resource_from_arn) {
        Some(resource) => resource,
        None => {
            let resource_type = ResourceType::from_origin(doc.origin.as_deref()?)?;
            resource_from_name(resource_type, &doc.name)?
        }
    };
    Some(with_status(resource, doc))
}

fn resource_from_name(resource_type: ResourceType, name: &str) -> Option<Resource> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if resource_type == ResourceType::ApiGateway {
        return Some(match name.split_once('/') {
            Some((api, stage)) if !api.is_empty() => {
                let resource = Resource::new(resource_type, api, DiscoverySource::Trace);
                if stage.is_empty() {
                    resource
                } else {
                    resource.with_stage(stage)
                }
            }
            Some(_) => return None,
            None => Resource::new(resource_type, name, DiscoverySource::Trace),
        });
    }

    Some(Resource::new(resource_type, name, DiscoverySource::Trace))
}

/// Downstream resource a subsegment calls into, if it names one.
fn subsegment_target(sub: &SegmentDocument) -> Option<Resource> {
    if is_sync_execution(sub) {
        return Some(with_status(sync_execution_resource(sub), sub));
    }

    if let Some(resource) = sub.resource_arn.as_deref().and_then(resource_from_arn) {
        return Some(with_status(resource, sub));
    }

    if !sub.is_aws_call() {
        return None;
    }

    let resource_type = ResourceType::from_service_name(&sub.name)?;
    let resource = match resource_type {
        ResourceType::DynamoDb => named(resource_type, sub.aws_str("table_name")),
        ResourceType::Sqs => named(
            resource_type,
            sub.aws_str("queue_url")
                .and_then(|url| url.rsplit('/').next())
                .or_else(|| sub.aws_str("queue_name")),
        ),
        ResourceType::Sns => sub
            .aws_str("topic_arn")
            .and_then(resource_from_arn)
            .or_else(|| named(resource_type, sub.aws_str("topic_name"))),
        ResourceType::S3 => named(
            resource_type,
            sub.aws_str("bucket_name").or_else(|| sub.aws_str("bucket")),
        ),
        ResourceType::Lambda => named(
            resource_type,
            sub.aws_str("function_name")
                .map(|name| name.rsplit(':').next().unwrap_or(name)),
        ),
        ResourceType::StepFunctions => sub
            .aws_str("execution_arn")
            .or_else(|| sub.aws_str("state_machine_arn"))
            .and_then(resource_from_arn),
        ResourceType::EventBridge => named(
            resource_type,
            sub.aws_str("event_bus_name").or(Some("default")),
        ),
        _ => None,
    }?;

    let resource = match sub.aws_str("region") {
        Some(region) if resource.region.is_none() => resource.with_region(region),
        _ => resource,
    };
    Some(with_status(resource, sub))
}

fn named(resource_type: ResourceType, name: Option<&str>) -> Option<Resource> {
    let name = name?.trim();
    if name.is_empty() {
        return None;
    }
    Some(Resource::new(resource_type, name, DiscoverySource::Trace))
}

fn is_sync_execution(sub: &SegmentDocument) -> bool {
    sub.name == SYNC_EXECUTION_SUBSEGMENT
        && sub
            .request_url()
            .is_some_and(|url| url.contains(SYNC_EXECUTION_ACTION))
}

/// The execution ARN when recorded, otherwise a placeholder keyed on the subsegment.
fn sync_execution_resource(sub: &SegmentDocument) -> Resource {
    let recorded = sub
        .resource_arn
        .as_deref()
        .or_else(|| sub.aws_str("execution_arn"))
        .or_else(|| sub.aws_str("state_machine_arn"))
        .and_then(resource_from_arn);

    recorded.unwrap_or_else(|| {
        let execution_id = sub.id.clone().unwrap_or_else(|| "unknown".to_string());
        Resource::new(
            ResourceType::StepFunctions,
            format!("sync-execution-{}", execution_id),
            DiscoverySource::Trace,
        )
        .with_execution_id(execution_id)
    })
}

fn with_status(mut resource: Resource, doc: &SegmentDocument) -> Resource {
    resource.metadata.extend(doc.status_metadata());
    resource
}
