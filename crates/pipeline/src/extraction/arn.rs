use rootscope_core::{DiscoverySource, Resource, ResourceType};

/// Components of `arn:<partition>:<service>:<region>:<account>:<resource>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn<'a> {
    pub service: &'a str,
    pub region: &'a str,
    pub account: &'a str,
    pub resource: &'a str,
}

impl<'a> Arn<'a> {
    pub fn parse(arn: &'a str) -> Option<Self> {
        let mut parts = arn.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let _partition = parts.next()?;
        let service = parts.next()?;
        let region = parts.next()?;
        let account = parts.next()?;
        let resource = parts.next()?;
        if service.is_empty() || resource.is_empty() {
            return None;
        }
        Some(Self {
            service,
            region,
            account,
            resource,
        })
    }
}

/// Builds a trace-sourced resource from an ARN, extracting the
/// type-specific identifiers (function name, API id and stage, execution id).
pub fn resource_from_arn(arn: &str) -> Option<Resource> {
    let parsed = Arn::parse(arn)?;
    let resource_type = ResourceType::from_arn_service(parsed.service)?;

    let mut resource = match resource_type {
        ResourceType::Lambda => {
            let name = parsed
                .resource
                .strip_prefix("function:")
                .and_then(|rest| rest.split(':').next())?;
            Resource::new(resource_type, name, DiscoverySource::Trace)
        }
        ResourceType::ApiGateway => api_gateway_from_arn(parsed.resource)?,
        ResourceType::StepFunctions => step_functions_from_arn(parsed.resource)?,
        ResourceType::DynamoDb => {
            let name = parsed.resource.strip_prefix("table/")?.split('/').next()?;
            Resource::new(resource_type, name, DiscoverySource::Trace)
        }
        ResourceType::S3 => {
            let name = parsed.resource.split('/').next()?;
            Resource::new(resource_type, name, DiscoverySource::Trace)
        }
        _ => {
            let name = parsed
                .resource
                .rsplit(|c| c == '/' || c == ':')
                .next()?;
            Resource::new(resource_type, name, DiscoverySource::Trace)
        }
    };

    if resource.name.is_empty() {
        return None;
    }
    if !parsed.region.is_empty() {
        resource = resource.with_region(parsed.region);
    }
    Some(resource.with_arn(arn))
}

/// `/restapis/<id>/stages/<stage>` (apigateway) or `<id>/<stage>/...` (execute-api)
fn api_gateway_from_arn(path: &str) -> Option<Resource> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (id, stage) = match segments.as_slice() {
        ["restapis", id, "stages", stage, ..] => (*id, Some(*stage)),
        ["restapis", id, ..] => (*id, None),
        [id, stage, ..] => (*id, Some(*stage)),
        [id] => (*id, None),
        [] => return None,
    };

    let resource = Resource::new(ResourceType::ApiGateway, id, DiscoverySource::Trace);
    Some(match stage {
        Some(stage) if !stage.is_empty() && stage != "*" => resource.with_stage(stage),
        _ => resource,
    })
}

/// `stateMachine:<name>` or `execution:<machine>:<execution id>`
fn step_functions_from_arn(path: &str) -> Option<Resource> {
    let mut parts = path.split(':');
    let kind = parts.next()?;
    let machine = parts.next()?;
    let resource = Resource::new(ResourceType::StepFunctions, machine, DiscoverySource::Trace);

    match kind {
        "stateMachine" => Some(resource),
        "execution" | "express" => {
            let execution_id = parts.next()?;
            Some(resource.with_execution_id(execution_id))
        }
        _ => None,
    }
}
