use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Kind of infrastructure entity an investigation can discover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Lambda,
    ApiGateway,
    StepFunctions,
    DynamoDb,
    Sqs,
    Sns,
    S3,
    Ecs,
    Ec2,
    EventBridge,
}

impl ResourceType {
    pub const ALL: [ResourceType; 10] = [
        ResourceType::Lambda,
        ResourceType::ApiGateway,
        ResourceType::StepFunctions,
        ResourceType::DynamoDb,
        ResourceType::Sqs,
        ResourceType::Sns,
        ResourceType::S3,
        ResourceType::Ecs,
        ResourceType::Ec2,
        ResourceType::EventBridge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Lambda => "lambda",
            ResourceType::ApiGateway => "apigateway",
            ResourceType::StepFunctions => "stepfunctions",
            ResourceType::DynamoDb => "dynamodb",
            ResourceType::Sqs => "sqs",
            ResourceType::Sns => "sns",
            ResourceType::S3 => "s3",
            ResourceType::Ecs => "ecs",
            ResourceType::Ec2 => "ec2",
            ResourceType::EventBridge => "eventbridge",
        }
    }

    /// Maps an X-Ray `origin` tag such as `AWS::ApiGateway::Stage`.
    pub fn from_origin(origin: &str) -> Option<Self> {
        let service = origin.strip_prefix("AWS::")?.split("::").next()?;
        match service.to_ascii_lowercase().as_str() {
            "lambda" => Some(ResourceType::Lambda),
            "apigateway" => Some(ResourceType::ApiGateway),
            "stepfunctions" | "states" => Some(ResourceType::StepFunctions),
            "dynamodb" => Some(ResourceType::DynamoDb),
            "sqs" => Some(ResourceType::Sqs),
            "sns" => Some(ResourceType::Sns),
            "s3" => Some(ResourceType::S3),
            "ecs" => Some(ResourceType::Ecs),
            "ec2" => Some(ResourceType::Ec2),
            "events" | "eventbridge" => Some(ResourceType::EventBridge),
            _ => None,
        }
    }

    /// Maps the service field of an ARN (`arn:aws:<service>:...`).
    pub fn from_arn_service(service: &str) -> Option<Self> {
        match service {
            "lambda" => Some(ResourceType::Lambda),
            "apigateway" | "execute-api" => Some(ResourceType::ApiGateway),
            "states" => Some(ResourceType::StepFunctions),
            "dynamodb" => Some(ResourceType::DynamoDb),
            "sqs" => Some(ResourceType::Sqs),
            "sns" => Some(ResourceType::Sns),
            "s3" => Some(ResourceType::S3),
            "ecs" => Some(ResourceType::Ecs),
            "ec2" => Some(ResourceType::Ec2),
            "events" => Some(ResourceType::EventBridge),
            _ => None,
        }
    }

    /// Maps the display name of an AWS SDK subsegment (`DynamoDB`, `SQS`, ...).
    pub fn from_service_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lambda" => Some(ResourceType::Lambda),
            "dynamodb" => Some(ResourceType::DynamoDb),
            "sqs" => Some(ResourceType::Sqs),
            "sns" => Some(ResourceType::Sns),
            "s3" => Some(ResourceType::S3),
            "stepfunctions" | "sfn" | "states" => Some(ResourceType::StepFunctions),
            "eventbridge" | "events" => Some(ResourceType::EventBridge),
            "ecs" => Some(ResourceType::Ecs),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "lambda" | "function" | "lambdafunction" => Ok(ResourceType::Lambda),
            "apigateway" | "api" | "restapi" => Ok(ResourceType::ApiGateway),
            "stepfunctions" | "stepfunction" | "statemachine" | "states" | "sfn" => {
                Ok(ResourceType::StepFunctions)
            }
            "dynamodb" | "table" | "dynamodbtable" => Ok(ResourceType::DynamoDb),
            "sqs" | "queue" => Ok(ResourceType::Sqs),
            "sns" | "topic" => Ok(ResourceType::Sns),
            "s3" | "bucket" => Ok(ResourceType::S3),
            "ecs" | "service" | "container" => Ok(ResourceType::Ecs),
            "ec2" | "instance" => Ok(ResourceType::Ec2),
            "eventbridge" | "events" | "eventbus" => Ok(ResourceType::EventBridge),
            _ => Err(format!("Unknown resource type: {}", s)),
        }
    }
}

/// How a resource entered the investigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    ExplicitTarget,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    pub source: DiscoverySource,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Resource {
    pub fn new(resource_type: ResourceType, name: impl Into<String>, source: DiscoverySource) -> Self {
        Self {
            resource_type,
            name: name.into(),
            arn: None,
            region: None,
            stage: None,
            execution_id: None,
            source,
            metadata: Map::new(),
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Dedup key: the ARN when known, the name otherwise.
    pub fn key(&self) -> &str {
        self.arn.as_deref().unwrap_or(&self.name)
    }

    /// Short human label such as `apigateway:abc123def`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.resource_type, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Invoked,
    ReadFrom,
    WroteTo,
    PublishedTo,
    Called,
}

impl RelationshipKind {
    /// Infers the edge kind from an AWS SDK operation name.
    pub fn from_operation(target: ResourceType, operation: Option<&str>) -> Self {
        if matches!(target, ResourceType::Lambda | ResourceType::StepFunctions) {
            return RelationshipKind::Invoked;
        }

        let Some(op) = operation else {
            return RelationshipKind::Called;
        };

        const READS: [&str; 7] = [
            "Get", "Query", "Scan", "BatchGet", "Receive", "List", "Head",
        ];
        const WRITES: [&str; 6] = ["Put", "Update", "Delete", "BatchWrite", "Send", "Transact"];

        if op.starts_with("Publish") || op.starts_with("PutEvents") {
            RelationshipKind::PublishedTo
        } else if READS.iter().any(|prefix| op.starts_with(prefix)) {
            RelationshipKind::ReadFrom
        } else if WRITES.iter().any(|prefix| op.starts_with(prefix)) {
            RelationshipKind::WroteTo
        } else {
            RelationshipKind::Called
        }
    }
}

/// Directed edge between two resources, identified by their dedup keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub kind: RelationshipKind,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefers_arn() {
        let resource = Resource::new(ResourceType::Lambda, "checkout", DiscoverySource::Trace)
            .with_arn("arn:aws:lambda:us-east-1:123456789012:function:checkout");
        assert_eq!(
            resource.key(),
            "arn:aws:lambda:us-east-1:123456789012:function:checkout"
        );

        let bare = Resource::new(ResourceType::Lambda, "checkout", DiscoverySource::Trace);
        assert_eq!(bare.key(), "checkout");
    }

    #[test]
    fn test_from_origin() {
        assert_eq!(
            ResourceType::from_origin("AWS::ApiGateway::Stage"),
            Some(ResourceType::ApiGateway)
        );
        assert_eq!(
            ResourceType::from_origin("AWS::Lambda::Function"),
            Some(ResourceType::Lambda)
        );
        assert_eq!(
            ResourceType::from_origin("AWS::StepFunctions::StateMachine"),
            Some(ResourceType::StepFunctions)
        );
        assert_eq!(ResourceType::from_origin("AWS::Unknown::Thing"), None);
        assert_eq!(ResourceType::from_origin("client"), None);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("api_gateway".parse(), Ok(ResourceType::ApiGateway));
        assert_eq!("State-Machine".parse(), Ok(ResourceType::StepFunctions));
        assert_eq!("Lambda".parse(), Ok(ResourceType::Lambda));
        assert!("mainframe".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_serialized_type_tag() {
        let resource = Resource::new(ResourceType::ApiGateway, "abc123def", DiscoverySource::Trace)
            .with_stage("prod");
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["type"], "apigateway");
        assert_eq!(json["stage"], "prod");
        assert_eq!(json["source"], "trace");
        assert!(json.get("arn").is_none());
    }

    #[test]
    fn test_relationship_kind_from_operation() {
        assert_eq!(
            RelationshipKind::from_operation(ResourceType::DynamoDb, Some("GetItem")),
            RelationshipKind::ReadFrom
        );
        assert_eq!(
            RelationshipKind::from_operation(ResourceType::DynamoDb, Some("PutItem")),
            RelationshipKind::WroteTo
        );
        assert_eq!(
            RelationshipKind::from_operation(ResourceType::Sns, Some("Publish")),
            RelationshipKind::PublishedTo
        );
        assert_eq!(
            RelationshipKind::from_operation(ResourceType::Lambda, Some("GetFunction")),
            RelationshipKind::Invoked
        );
        assert_eq!(
            RelationshipKind::from_operation(ResourceType::S3, None),
            RelationshipKind::Called
        );
    }
}
