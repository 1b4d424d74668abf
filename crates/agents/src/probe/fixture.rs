use super::{Probe, ProbeResult};
use crate::session::CloudSession;
use async_trait::async_trait;
use rootscope_core::ResourceType;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves probe documents from `<root>/<type>/<name>.json`.
///
/// Used for offline investigations and tests; a missing or malformed file is
/// reported as a probe error rather than a crash.
#[derive(Debug, Clone)]
pub struct FixtureProbe {
    root: PathBuf,
    resource_type: ResourceType,
    name: String,
}

impl FixtureProbe {
    pub fn new(root: impl AsRef<Path>, resource_type: ResourceType) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            resource_type,
            name: format!("fixture:{}", resource_type),
        }
    }

    fn fixture_path(&self, resource_name: &str) -> PathBuf {
        let file_name: String = resource_name
            .chars()
            .map(|c| if matches!(c, '/' | ':' | '\\') { '_' } else { c })
            .collect();
        self.root
            .join(self.resource_type.name())
            .join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl Probe for FixtureProbe {
    async fn probe(
        &self,
        resource_name: &str,
        region: &str,
        session: &CloudSession,
    ) -> ProbeResult {
        let path = self.fixture_path(resource_name);
        debug!(
            path = %path.display(),
            region,
            session_id = %session.session_id,
            "Reading probe fixture"
        );

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                return ProbeResult::error(format!(
                    "No probe data for {} {}: {}",
                    self.resource_type, resource_name, e
                ))
            }
        };

        match serde_json::from_str(&contents) {
            Ok(document) => ProbeResult::from_document(document),
            Err(e) => ProbeResult::error(format!(
                "Malformed probe data in {}: {}",
                path.display(),
                e
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
