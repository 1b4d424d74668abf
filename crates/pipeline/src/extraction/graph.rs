use rootscope_core::{Relationship, RelationshipKind, Resource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A segment whose document could not be decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseMiss {
    pub trace_id: String,
    pub segment_id: String,
    pub error: String,
}

/// De-duplicated resources and the edges between them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub trace_ids: Vec<String>,
    pub resources: Vec<Resource>,
    pub relationships: Vec<Relationship>,
    pub parse_misses: Vec<ParseMiss>,
    pub total_duration_secs: f64,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn find(&self, key: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.key() == key)
    }

    /// Inserts `resource` unless an equivalent one was already seen, and
    /// returns the key of the retained resource.
    ///
    /// Equivalent means the same dedup key, or the same type, name and
    /// execution id when at least one side has no ARN.
    pub fn insert_resource(&mut self, resource: Resource) -> String {
        if let Some(existing) = self.resources.iter().find(|r| is_same_resource(r, &resource)) {
            return existing.key().to_string();
        }
        let key = resource.key().to_string();
        self.resources.push(resource);
        key
    }

    /// Adds an edge unless the same (from, to, kind) edge exists. Self-edges are dropped.
    pub fn insert_relationship(
        &mut self,
        from: &str,
        to: &str,
        kind: RelationshipKind,
        evidence: Option<&str>,
    ) -> bool {
        if from == to {
            return false;
        }
        let exists = self
            .relationships
            .iter()
            .any(|r| r.from == from && r.to == to && r.kind == kind);
        if exists {
            return false;
        }
        self.relationships.push(Relationship {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            evidence: evidence.map(|e| vec![e.to_string()]).unwrap_or_default(),
        });
        true
    }

    /// Folds another graph into this one with the same first-seen rules.
    ///
    /// Edges of `other` are rewritten onto the keys of the resources they were
    /// folded into, so an ARN-less sighting merged into an ARN resource keeps
    /// its edges attached.
    pub fn merge(&mut self, other: ResourceGraph) {
        for trace_id in other.trace_ids {
            if !self.trace_ids.contains(&trace_id) {
                self.trace_ids.push(trace_id);
            }
        }

        let mut retained: HashMap<String, String> = HashMap::new();
        for resource in other.resources {
            let incoming = resource.key().to_string();
            let key = self.insert_resource(resource);
            retained.entry(incoming).or_insert(key);
        }

        for rel in other.relationships {
            let from = retained.get(&rel.from).cloned().unwrap_or(rel.from);
            let to = retained.get(&rel.to).cloned().unwrap_or(rel.to);
            self.insert_relationship(&from, &to, rel.kind, rel.evidence.first().map(String::as_str));
        }
        self.parse_misses.extend(other.parse_misses);
        self.total_duration_secs += other.total_duration_secs;
    }
}

fn is_same_resource(a: &Resource, b: &Resource) -> bool {
    if a.key() == b.key() {
        return true;
    }
    if a.arn.is_some() && b.arn.is_some() {
        return false;
    }
    a.resource_type == b.resource_type && a.name == b.name && a.execution_id == b.execution_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootscope_core::{DiscoverySource, ResourceType};

    fn lambda(name: &str) -> Resource {
        Resource::new(ResourceType::Lambda, name, DiscoverySource::Trace)
    }

    #[test]
    fn test_first_seen_wins() {
        let mut graph = ResourceGraph::new();
        graph.insert_resource(lambda("checkout").with_metadata("fault", true.into()));
        graph.insert_resource(lambda("checkout"));
        assert_eq!(graph.resources.len(), 1);
        assert!(graph.resources[0].metadata.contains_key("fault"));
    }

    #[test]
    fn test_arnless_sighting_joins_arn_resource() {
        let mut graph = ResourceGraph::new();
        let arn = "arn:aws:lambda:us-east-1:1:function:checkout";
        graph.insert_resource(lambda("checkout").with_arn(arn));
        let key = graph.insert_resource(lambda("checkout"));
        assert_eq!(key, arn);
        assert_eq!(graph.resources.len(), 1);
    }

    #[test]
    fn test_distinct_executions_are_distinct() {
        let mut graph = ResourceGraph::new();
        let base = "arn:aws:states:us-east-1:1:execution:OrderFlow:";
        for id in ["a", "b"] {
            graph.insert_resource(
                Resource::new(ResourceType::StepFunctions, "OrderFlow", DiscoverySource::Trace)
                    .with_arn(format!("{}{}", base, id))
                    .with_execution_id(id),
            );
        }
        assert_eq!(graph.resources.len(), 2);
    }

    #[test]
    fn test_relationship_dedup_and_self_edges() {
        let mut graph = ResourceGraph::new();
        assert!(graph.insert_relationship("a", "b", RelationshipKind::Invoked, Some("s1")));
        assert!(!graph.insert_relationship("a", "b", RelationshipKind::Invoked, Some("s2")));
        assert!(graph.insert_relationship("a", "b", RelationshipKind::ReadFrom, None));
        assert!(!graph.insert_relationship("a", "a", RelationshipKind::Called, None));
        assert_eq!(graph.relationships.len(), 2);
        assert_eq!(graph.relationships[0].evidence, vec!["s1".to_string()]);
    }

    #[test]
    fn test_merge() {
        let mut first = ResourceGraph::new();
        first.trace_ids.push("1-a".to_string());
        first.insert_resource(lambda("checkout"));

        let mut second = ResourceGraph::new();
        second.trace_ids.push("1-b".to_string());
        second.insert_resource(lambda("checkout"));
        second.insert_resource(lambda("billing"));
        second.insert_relationship("checkout", "billing", RelationshipKind::Invoked, None);
        second.total_duration_secs = 1.5;

        first.merge(second);
        assert_eq!(first.trace_ids, vec!["1-a", "1-b"]);
        assert_eq!(first.resources.len(), 2);
        assert_eq!(first.relationships.len(), 1);
        assert_eq!(first.total_duration_secs, 1.5);
    }

    #[test]
    fn test_merge_rewrites_edges_onto_retained_keys() {
        let arn = "arn:aws:lambda:us-east-1:1:function:checkout";
        let mut first = ResourceGraph::new();
        first.insert_resource(lambda("checkout").with_arn(arn));

        let mut second = ResourceGraph::new();
        second.insert_resource(lambda("checkout"));
        second.insert_resource(Resource::new(ResourceType::DynamoDb, "orders", DiscoverySource::Trace));
        second.insert_relationship("checkout", "orders", RelationshipKind::WroteTo, Some("b1"));

        first.merge(second);
        assert_eq!(first.resources.len(), 2);
        let edge = &first.relationships[0];
        assert_eq!(edge.from, arn);
        assert!(first.find(&edge.from).is_some());
        assert!(first.find(&edge.to).is_some());
        assert_eq!(edge.evidence, vec!["b1".to_string()]);
    }

    #[test]
    fn test_merge_rewrites_incoming_edge_targets() {
        let mut first = ResourceGraph::new();
        first.insert_resource(lambda("checkout").with_arn("arn:aws:lambda:us-east-1:1:function:checkout"));

        let mut second = ResourceGraph::new();
        second.insert_resource(lambda("checkout"));
        second.insert_resource(lambda("billing"));
        second.insert_relationship("billing", "checkout", RelationshipKind::Invoked, None);

        first.merge(second);
        assert_eq!(first.resources.len(), 2);
        assert_eq!(first.relationships[0].to, "arn:aws:lambda:us-east-1:1:function:checkout");
    }
}
