//! Canonical data model shared by every investigation stage

pub mod fact;
pub mod phase;
pub mod resource;

pub use fact::{Fact, FACT_PLACEHOLDER};
pub use phase::{InvestigationPhase, TokenUsage};
pub use resource::{DiscoverySource, Relationship, RelationshipKind, Resource, ResourceType};
