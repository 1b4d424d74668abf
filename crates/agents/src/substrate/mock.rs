use super::client::AgentSubstrate;
use super::types::{AgentHandoff, SubstrateRequest, SubstrateResponse};
use async_trait::async_trait;
use rootscope_core::{SubstrateError, TokenUsage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted substrate that replays queued responses in order
pub struct MockSubstrate {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<SubstrateRequest>>,
    finished_runs: Mutex<Vec<String>>,
    name: String,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub agent: String,
    pub usage: TokenUsage,
    pub handoffs: Vec<AgentHandoff>,
    pub error: Option<SubstrateError>,
    /// Simulated latency, used to exercise call timeouts
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn text(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            agent: agent.into(),
            usage: TokenUsage::default(),
            handoffs: Vec::new(),
            error: None,
            delay: None,
        }
    }

    pub fn error(error: SubstrateError) -> Self {
        Self {
            content: String::new(),
            agent: String::new(),
            usage: TokenUsage::default(),
            handoffs: Vec::new(),
            error: Some(error),
            delay: None,
        }
    }

    pub fn with_usage(mut self, input: u64, output: u64) -> Self {
        self.usage = TokenUsage::new(input, output);
        self
    }

    pub fn with_handoffs<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handoffs = agents
            .into_iter()
            .map(|agent| AgentHandoff::new(agent, None))
            .collect();
        self
    }

    /// Handoffs that carry the phase each agent reported
    pub fn with_phase_handoffs(mut self, handoffs: Vec<AgentHandoff>) -> Self {
        self.handoffs = handoffs;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl MockSubstrate {
    pub fn new() -> Self {
        Self::with_name("MockSubstrate")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            finished_runs: Mutex::new(Vec::new()),
            name: name.into(),
        }
    }

    pub fn add_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(response);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<SubstrateRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Run ids passed to `finish_run`, in order
    pub fn finished_runs(&self) -> Vec<String> {
        self.finished_runs.lock().unwrap().clone()
    }
}

impl Default for MockSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentSubstrate for MockSubstrate {
    async fn invoke(&self, request: SubstrateRequest) -> Result<SubstrateResponse, SubstrateError> {
        self.requests.lock().unwrap().push(request);

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SubstrateError::Exhausted {
                message: "MockSubstrate: No more responses in queue".to_string(),
            })?;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = response.error {
            return Err(error);
        }

        Ok(SubstrateResponse::text(
            response.agent,
            response.content,
            response.usage,
            Duration::from_millis(10),
        )
        .with_handoffs(response.handoffs))
    }

    fn finish_run(&self, run_id: &str) {
        self.finished_runs.lock().unwrap().push(run_id.to_string());
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_info(&self) -> Option<String> {
        Some("mock-model".to_string())
    }
}

impl std::fmt::Debug for MockSubstrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSubstrate")
            .field("name", &self.name)
            .field("remaining_responses", &self.remaining_responses())
            .finish()
    }
}
