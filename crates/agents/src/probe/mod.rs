//! Service probes
//!
//! A probe inspects one resource in the target account and returns a
//! structured document. Probes never raise: failures come back as
//! [`ProbeResult::Error`] so a single bad resource cannot abort a phase.

mod fixture;

pub use fixture::FixtureProbe;

use crate::session::CloudSession;
use async_trait::async_trait;
use rootscope_core::ResourceType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeResult {
    Success { payload: Value },
    Error { message: String },
}

impl ProbeResult {
    /// Classifies a raw probe document. An object with a string `error`
    /// field is a failure; anything else is a successful payload.
    pub fn from_document(document: Value) -> Self {
        match document.get("error").and_then(Value::as_str) {
            Some(message) => ProbeResult::Error {
                message: message.to_string(),
            },
            None => ProbeResult::Success { payload: document },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProbeResult::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Success { .. })
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, resource_name: &str, region: &str, session: &CloudSession)
        -> ProbeResult;

    fn name(&self) -> &str;
}

/// Probe lookup by resource type
#[derive(Default, Clone)]
pub struct ProbeRegistry {
    probes: HashMap<ResourceType, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one [`FixtureProbe`] per resource type rooted at `dir`.
    pub fn from_fixture_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self::new();
        for resource_type in ResourceType::ALL {
            registry.register(
                resource_type,
                Arc::new(FixtureProbe::new(dir.as_ref(), resource_type)),
            );
        }
        registry
    }

    pub fn register(&mut self, resource_type: ResourceType, probe: Arc<dyn Probe>) {
        self.probes.insert(resource_type, probe);
    }

    pub fn get(&self, resource_type: ResourceType) -> Option<Arc<dyn Probe>> {
        self.probes.get(&resource_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.probes.keys().map(|t| t.name()).collect();
        types.sort_unstable();
        f.debug_struct("ProbeRegistry").field("types", &types).finish()
    }
}
