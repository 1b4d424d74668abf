use super::client::AgentSubstrate;
use super::types::{SubstrateRequest, SubstrateResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use rootscope_core::{InvestigationPhase, SubstrateError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    Record,
    Replay,
    Auto,
}

impl RecordingMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "record" => Ok(RecordingMode::Record),
            "replay" => Ok(RecordingMode::Replay),
            "auto" => Ok(RecordingMode::Auto),
            _ => anyhow::bail!("Invalid recording mode: {}", s),
        }
    }

    pub fn from_env(default: RecordingMode) -> RecordingMode {
        std::env::var("ROOTSCOPE_RECORDING_MODE")
            .ok()
            .and_then(|s| Self::parse(&s).ok())
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedExchange {
    pub request_hash: String,
    pub request: RecordedRequest,
    pub response: SubstrateResponse,
    pub recorded_at: String,
}

/// Run-independent view of a request, used as the replay key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedRequest {
    pub phase: InvestigationPhase,
    pub prompt: String,
    pub trace_ids: Vec<String>,
    pub resources: Vec<String>,
    pub fact_count: usize,
    pub model: Option<String>,
}

impl RecordedRequest {
    pub fn from_substrate_request(req: &SubstrateRequest, model: Option<String>) -> Self {
        let state = &req.shared_state;
        Self {
            phase: state.phase,
            prompt: Self::normalize_content(&req.prompt),
            trace_ids: state.trace_ids.clone(),
            resources: state.resources.iter().map(|r| r.label()).collect(),
            fact_count: state.facts.len(),
            model,
        }
    }

    /// Run ids are v4 UUIDs and must not leak into the key.
    fn normalize_content(content: &str) -> String {
        static UUID_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
        let uuid_re = UUID_REGEX.get_or_init(|| {
            Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").ok()
        });
        match uuid_re {
            Some(re) => re.replace_all(content, "[UUID]").to_string(),
            None => content.to_string(),
        }
    }

    pub fn canonical_hash(&self) -> String {
        let canonical_json = serde_json::to_string(self).unwrap_or_default();
        format!("{:x}", md5::compute(canonical_json.as_bytes()))
    }
}

/// Record/replay wrapper around another substrate, keyed by request hash
pub struct RecordingSubstrate {
    inner: Arc<dyn AgentSubstrate>,
    mode: RecordingMode,
    recordings_dir: PathBuf,
    cache: HashMap<String, SubstrateResponse>,
}

impl RecordingSubstrate {
    pub fn new(
        inner: Arc<dyn AgentSubstrate>,
        mode: RecordingMode,
        recordings_dir: PathBuf,
    ) -> Result<Self> {
        std::fs::create_dir_all(&recordings_dir)
            .context("Failed to create recordings directory")?;

        Ok(Self {
            inner,
            mode,
            recordings_dir,
            cache: HashMap::new(),
        })
    }

    pub fn mode(&self) -> RecordingMode {
        self.mode
    }

    fn recording_path(&self, request_hash: &str) -> PathBuf {
        self.recordings_dir.join(format!("{}.json", request_hash))
    }

    fn load_recording(&self, request_hash: &str) -> Result<Option<SubstrateResponse>> {
        let path = self.recording_path(request_hash);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read recording: {}", path.display()))?;

        let exchange: RecordedExchange = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse recording: {}", path.display()))?;

        Ok(Some(exchange.response))
    }

    fn save_recording(&self, request: &RecordedRequest, response: &SubstrateResponse) -> Result<()> {
        let request_hash = request.canonical_hash();

        let exchange = RecordedExchange {
            request_hash: request_hash.clone(),
            request: request.clone(),
            response: response.clone(),
            recorded_at: chrono::Utc::now().to_rfc3339(),
        };

        let path = self.recording_path(&request_hash);
        let contents =
            serde_json::to_string_pretty(&exchange).context("Failed to serialize recording")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write recording: {}", path.display()))?;

        debug!(hash = %request_hash, "Saved substrate recording");
        Ok(())
    }

    /// Load every recording in the directory into memory.
    pub fn preload_cache(&mut self) -> Result<()> {
        for entry in std::fs::read_dir(&self.recordings_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let contents = std::fs::read_to_string(&path)?;
            let exchange: RecordedExchange = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse recording: {}", path.display()))?;
            self.cache.insert(exchange.request_hash, exchange.response);
        }

        Ok(())
    }

    fn lookup(&self, request_hash: &str) -> Result<Option<SubstrateResponse>, SubstrateError> {
        if let Some(response) = self.cache.get(request_hash) {
            return Ok(Some(response.clone()));
        }
        self.load_recording(request_hash)
            .map_err(|e| SubstrateError::other(format!("Failed to load recording: {}", e)))
    }

    async fn record(
        &self,
        recorded: &RecordedRequest,
        request: SubstrateRequest,
    ) -> Result<SubstrateResponse, SubstrateError> {
        let response = self.inner.invoke(request).await?;
        self.save_recording(recorded, &response)
            .map_err(|e| SubstrateError::other(format!("Failed to save recording: {}", e)))?;
        Ok(response)
    }
}

#[async_trait]
impl AgentSubstrate for RecordingSubstrate {
    async fn invoke(&self, request: SubstrateRequest) -> Result<SubstrateResponse, SubstrateError> {
        let recorded = RecordedRequest::from_substrate_request(&request, self.inner.model_info());
        let request_hash = recorded.canonical_hash();

        match self.mode {
            RecordingMode::Replay => match self.lookup(&request_hash)? {
                Some(response) => Ok(response),
                None => Err(SubstrateError::Exhausted {
                    message: format!(
                        "No recording found for request hash: {} (phase {})",
                        request_hash, recorded.phase
                    ),
                }),
            },
            RecordingMode::Record => self.record(&recorded, request).await,
            RecordingMode::Auto => match self.lookup(&request_hash)? {
                Some(response) => Ok(response),
                None => self.record(&recorded, request).await,
            },
        }
    }

    fn name(&self) -> &str {
        "RecordingSubstrate"
    }

    fn model_info(&self) -> Option<String> {
        self.inner.model_info()
    }

    fn finish_run(&self, run_id: &str) {
        self.inner.finish_run(run_id);
    }
}
