//! GenAI-backed substrate
//!
//! Drives a single chat model through the `genai` crate. Each engine phase is
//! served by a role-specific system prompt; the model may report internal
//! handoffs by embedding a `handoffs` array in a JSON block of its answer.

use super::client::AgentSubstrate;
use super::types::{AgentHandoff, SubstrateRequest, SubstrateResponse};
use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use rootscope_core::{InvestigationPhase, RootscopeConfig, SubstrateError, TokenUsage};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error};

pub struct GenAiSubstrate {
    client: Client,
    model: String,
    provider: AdapterKind,
    timeout: Duration,
    /// Per-run cumulative usage; genai reports per-call counters only
    usage: Mutex<HashMap<String, TokenUsage>>,
}

impl GenAiSubstrate {
    /// Honors `ROOTSCOPE_API_BASE_URL` for self-hosted or proxied endpoints.
    pub fn new(provider: AdapterKind, model: impl Into<String>, timeout: Duration) -> Self {
        let model = model.into();
        let client = match std::env::var("ROOTSCOPE_API_BASE_URL").ok() {
            Some(endpoint_url) => {
                debug!(
                    "Using custom endpoint for {}: {}",
                    provider.as_str(),
                    endpoint_url
                );
                let model_clone = model.clone();
                let resolver = ServiceTargetResolver::from_resolver_fn(
                    move |_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                        let auth = match provider.default_key_env_name() {
                            Some(key_var) => AuthData::from_env(key_var),
                            None => AuthData::from_single(""),
                        };
                        Ok(ServiceTarget {
                            endpoint: Endpoint::from_owned(endpoint_url.clone()),
                            auth,
                            model: ModelIden::new(provider, &model_clone),
                        })
                    },
                );
                Client::builder()
                    .with_service_target_resolver(resolver)
                    .build()
            }
            None => Client::default(),
        };

        debug!(
            "Creating GenAI substrate: provider={}, model={}",
            provider.as_str(),
            model
        );

        Self {
            client,
            model,
            provider,
            timeout,
            usage: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RootscopeConfig) -> Self {
        Self::new(
            config.provider,
            config.model.clone(),
            Duration::from_secs(config.call_timeout_secs),
        )
    }

    fn accumulate(&self, run_id: &str, call: TokenUsage) -> TokenUsage {
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        let entry = usage.entry(run_id.to_string()).or_default();
        *entry = TokenUsage::new(entry.input + call.input, entry.output + call.output);
        *entry
    }

    #[cfg(test)]
    fn tracked_runs(&self) -> usize {
        self.usage.lock().map(|usage| usage.len()).unwrap_or(0)
    }
}

/// Agent role that serves each working phase
pub fn phase_agent(phase: InvestigationPhase) -> &'static str {
    match phase {
        InvestigationPhase::TraceAnalysis => "trace_specialist",
        InvestigationPhase::ServiceAnalysis => "service_specialist",
        InvestigationPhase::HypothesisGeneration => "hypothesis_generator",
        InvestigationPhase::RootCauseAnalysis => "root_cause_analyst",
        _ => "coordinator",
    }
}

fn system_prompt(phase: InvestigationPhase) -> String {
    format!(
        "You are the {} in a team of cloud incident investigators. \
         Base every statement on the shared investigation state you are given. \
         Answer with a JSON object containing a `facts` array of \
         {{\"content\", \"confidence\", \"metadata\"}} entries. \
         If you delegated work to other specialists, add a `handoffs` array of \
         {{\"agent\", \"phase\"}} entries in the order they happened.",
        phase_agent(phase).replace('_', " ")
    )
}

fn user_message(request: &SubstrateRequest) -> String {
    let state = serde_json::to_string_pretty(&request.shared_state).unwrap_or_default();
    format!(
        "{}\n\nRemaining budget: {} tokens, ${:.4}, {} handoffs.\n\nShared state:\n{}",
        request.prompt,
        request.budget.remaining_tokens,
        request.budget.remaining_cost,
        request.budget.remaining_handoffs,
        state
    )
}

fn extract_json_from_markdown(content: &str) -> &str {
    let trimmed = content.trim();

    for fence in ["```json", "```"] {
        if let Some(start_idx) = trimmed.find(fence) {
            let after_fence = &trimmed[start_idx + fence.len()..];
            if let Some(end_idx) = after_fence.find("```") {
                return after_fence[..end_idx].trim();
            }
        }
    }

    trimmed
}

/// Reads the handoff trail a model reported in its answer, if any.
pub fn parse_handoffs(content: &str) -> Vec<AgentHandoff> {
    let Ok(value) = serde_json::from_str::<Value>(extract_json_from_markdown(content)) else {
        return Vec::new();
    };

    value
        .get("handoffs")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::String(agent) => Some(AgentHandoff::new(agent.clone(), None)),
                    Value::Object(map) => {
                        let agent = map.get("agent")?.as_str()?;
                        let phase = map
                            .get("phase")
                            .and_then(Value::as_str)
                            .and_then(|p| p.parse::<InvestigationPhase>().ok())
                            .filter(|p| !p.is_terminal());
                        Some(AgentHandoff::new(agent, phase))
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn token_count(count: Option<i32>) -> u64 {
    count.unwrap_or(0).max(0) as u64
}

#[async_trait]
impl AgentSubstrate for GenAiSubstrate {
    async fn invoke(&self, request: SubstrateRequest) -> Result<SubstrateResponse, SubstrateError> {
        let start = Instant::now();
        let phase = request.phase();

        let chat_request = ChatRequest::new(vec![
            ChatMessage::system(system_prompt(phase)),
            ChatMessage::user(user_message(&request)),
        ]);
        let options = ChatOptions::default()
            .with_temperature(0.1)
            .with_max_tokens(request.budget.max_response_tokens);

        let response = match tokio::time::timeout(
            self.timeout,
            self.client
                .exec_chat(&self.model, chat_request, Some(&options)),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                error!("{} API error: {}", self.provider.as_str(), e);
                return Err(SubstrateError::ApiError {
                    message: format!("{} request failed: {}", self.provider.as_str(), e),
                    status_code: None,
                });
            }
            Err(_) => {
                error!(
                    "{} request timed out after {}s",
                    self.provider.as_str(),
                    self.timeout.as_secs()
                );
                return Err(SubstrateError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let content = response.first_text().unwrap_or_default().to_string();
        let call_usage = TokenUsage::new(
            token_count(response.usage.prompt_tokens),
            token_count(response.usage.completion_tokens),
        );
        let usage = self.accumulate(&request.shared_state.run_id, call_usage);
        let handoffs = parse_handoffs(&content);
        let agent = handoffs
            .last()
            .map(|h| h.agent.clone())
            .unwrap_or_else(|| phase_agent(phase).to_string());

        Ok(SubstrateResponse::text(agent, content, usage, start.elapsed()).with_handoffs(handoffs))
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }

    fn finish_run(&self, run_id: &str) {
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        usage.remove(run_id);
    }
}

impl std::fmt::Debug for GenAiSubstrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAiSubstrate")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}
