use genai::adapter::AdapterKind;
use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:14b";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
const DEFAULT_TOTAL_TIMEOUT_SECS: u64 = 900;
const DEFAULT_MAX_RESPONSE_TOKENS: u32 = 4096;

const DEFAULT_MAX_HANDOFFS: usize = 20;
const DEFAULT_MAX_TOKENS: u64 = 200_000;
const DEFAULT_MAX_COST: f64 = 2.0;
const DEFAULT_REPETITION_WINDOW: usize = 8;
const DEFAULT_BASE_COST_PER_RESOURCE: f64 = 0.05;
const DEFAULT_AGENT_COMPLEXITY_FACTOR: f64 = 0.1;
const DEFAULT_PHASE_COMPLEXITY_FACTOR: f64 = 0.25;
const DEFAULT_CONFIDENCE: f64 = 0.7;
const DEFAULT_PREVIEW_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, claude, gemini, grok, groq")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

pub fn parse_provider(s: &str) -> Result<AdapterKind, ConfigError> {
    match s.to_lowercase().as_str() {
        "ollama" => Ok(AdapterKind::Ollama),
        "openai" => Ok(AdapterKind::OpenAI),
        "claude" | "anthropic" => Ok(AdapterKind::Anthropic),
        "gemini" => Ok(AdapterKind::Gemini),
        "grok" | "xai" => Ok(AdapterKind::Xai),
        "groq" => Ok(AdapterKind::Groq),
        _ => Err(ConfigError::InvalidProvider(s.to_string())),
    }
}

/// Flow-control thresholds and cost heuristic constants.
///
/// None of these are load-bearing algorithm constants; every one can be tuned
/// per deployment through `ROOTSCOPE_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLimits {
    pub max_handoffs: usize,
    pub max_tokens: u64,
    pub max_cost: f64,
    /// Number of most recent handoffs inspected for A,B,A,B oscillation
    pub repetition_window: usize,
    pub base_cost_per_resource: f64,
    pub agent_complexity_factor: f64,
    pub phase_complexity_factor: f64,
    pub default_confidence: f64,
    pub content_preview_len: usize,
}

impl Default for FlowLimits {
    fn default() -> Self {
        Self {
            max_handoffs: DEFAULT_MAX_HANDOFFS,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_cost: DEFAULT_MAX_COST,
            repetition_window: DEFAULT_REPETITION_WINDOW,
            base_cost_per_resource: DEFAULT_BASE_COST_PER_RESOURCE,
            agent_complexity_factor: DEFAULT_AGENT_COMPLEXITY_FACTOR,
            phase_complexity_factor: DEFAULT_PHASE_COMPLEXITY_FACTOR,
            default_confidence: DEFAULT_CONFIDENCE,
            content_preview_len: DEFAULT_PREVIEW_LEN,
        }
    }
}

impl FlowLimits {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_handoffs: env_parse("ROOTSCOPE_MAX_HANDOFFS").unwrap_or(defaults.max_handoffs),
            max_tokens: env_parse("ROOTSCOPE_MAX_TOKENS").unwrap_or(defaults.max_tokens),
            max_cost: env_parse("ROOTSCOPE_MAX_COST").unwrap_or(defaults.max_cost),
            repetition_window: env_parse("ROOTSCOPE_REPETITION_WINDOW")
                .unwrap_or(defaults.repetition_window),
            base_cost_per_resource: env_parse("ROOTSCOPE_BASE_COST_PER_RESOURCE")
                .unwrap_or(defaults.base_cost_per_resource),
            agent_complexity_factor: env_parse("ROOTSCOPE_AGENT_COMPLEXITY_FACTOR")
                .unwrap_or(defaults.agent_complexity_factor),
            phase_complexity_factor: env_parse("ROOTSCOPE_PHASE_COMPLEXITY_FACTOR")
                .unwrap_or(defaults.phase_complexity_factor),
            default_confidence: env_parse("ROOTSCOPE_DEFAULT_CONFIDENCE")
                .unwrap_or(defaults.default_confidence),
            content_preview_len: env_parse("ROOTSCOPE_CONTENT_PREVIEW_LEN")
                .unwrap_or(defaults.content_preview_len),
        }
    }

    pub fn with_max_handoffs(mut self, max_handoffs: usize) -> Self {
        self.max_handoffs = max_handoffs;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn with_repetition_window(mut self, window: usize) -> Self {
        self.repetition_window = window;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_handoffs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max handoffs must be at least 1".to_string(),
            ));
        }
        if self.max_tokens < 1_000 {
            return Err(ConfigError::ValidationFailed(
                "Max tokens must be at least 1000".to_string(),
            ));
        }
        if !(self.max_cost > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "Max cost must be positive".to_string(),
            ));
        }
        if self.repetition_window < 4 {
            return Err(ConfigError::ValidationFailed(
                "Repetition window must cover at least 4 handoffs".to_string(),
            ));
        }
        if self.base_cost_per_resource < 0.0
            || self.agent_complexity_factor < 0.0
            || self.phase_complexity_factor < 0.0
        {
            return Err(ConfigError::ValidationFailed(
                "Cost heuristic factors cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(ConfigError::ValidationFailed(format!(
                "Default confidence must be within [0, 1], got {}",
                self.default_confidence
            )));
        }
        if self.content_preview_len < 16 {
            return Err(ConfigError::ValidationFailed(
                "Content preview length must be at least 16 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RootscopeConfig {
    pub provider: AdapterKind,
    pub model: String,
    pub log_level: String,
    pub default_region: String,
    /// Per substrate round-trip
    pub call_timeout_secs: u64,
    /// Whole investigation run
    pub total_timeout_secs: u64,
    pub max_response_tokens: u32,
    pub exchange_log: Option<PathBuf>,
    pub limits: FlowLimits,
}

impl Default for RootscopeConfig {
    fn default() -> Self {
        let provider = env::var("ROOTSCOPE_PROVIDER")
            .ok()
            .and_then(|s| parse_provider(&s).ok())
            .unwrap_or(AdapterKind::Ollama);

        let model = env::var("ROOTSCOPE_MODEL")
            .ok()
            .unwrap_or_else(|| match provider {
                AdapterKind::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
                _ => "default-model".to_string(),
            });

        let log_level = env::var("ROOTSCOPE_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let default_region = env::var("ROOTSCOPE_REGION")
            .or_else(|_| env::var("AWS_REGION"))
            .unwrap_or_else(|_| DEFAULT_REGION.to_string());

        Self {
            provider,
            model,
            log_level,
            default_region,
            call_timeout_secs: env_parse("ROOTSCOPE_CALL_TIMEOUT")
                .unwrap_or(DEFAULT_CALL_TIMEOUT_SECS),
            total_timeout_secs: env_parse("ROOTSCOPE_TOTAL_TIMEOUT")
                .unwrap_or(DEFAULT_TOTAL_TIMEOUT_SECS),
            max_response_tokens: env_parse("ROOTSCOPE_MAX_RESPONSE_TOKENS")
                .unwrap_or(DEFAULT_MAX_RESPONSE_TOKENS),
            exchange_log: env::var("ROOTSCOPE_EXCHANGE_LOG").ok().map(PathBuf::from),
            limits: FlowLimits::from_env(),
        }
    }
}

impl RootscopeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Call timeout must be at least 1 second".to_string(),
            ));
        }
        if self.call_timeout_secs > 3600 {
            return Err(ConfigError::ValidationFailed(
                "Call timeout cannot exceed 1 hour".to_string(),
            ));
        }
        if self.total_timeout_secs < self.call_timeout_secs {
            return Err(ConfigError::ValidationFailed(format!(
                "Total timeout ({}s) must not be shorter than the call timeout ({}s)",
                self.total_timeout_secs, self.call_timeout_secs
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if self.max_response_tokens < 256 {
            return Err(ConfigError::ValidationFailed(
                "Max response tokens must be at least 256".to_string(),
            ));
        }

        if self.default_region.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Default region cannot be empty".to_string(),
            ));
        }

        self.limits.validate()
    }

    pub fn to_display_map(&self) -> std::collections::BTreeMap<String, String> {
        let mut map = std::collections::BTreeMap::new();

        map.insert("provider".to_string(), format!("{:?}", self.provider));
        map.insert("model".to_string(), self.model.clone());
        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert("default_region".to_string(), self.default_region.clone());
        map.insert(
            "call_timeout_secs".to_string(),
            self.call_timeout_secs.to_string(),
        );
        map.insert(
            "total_timeout_secs".to_string(),
            self.total_timeout_secs.to_string(),
        );
        map.insert(
            "max_response_tokens".to_string(),
            self.max_response_tokens.to_string(),
        );
        if let Some(ref path) = self.exchange_log {
            map.insert("exchange_log".to_string(), path.display().to_string());
        }
        map.insert(
            "max_handoffs".to_string(),
            self.limits.max_handoffs.to_string(),
        );
        map.insert("max_tokens".to_string(), self.limits.max_tokens.to_string());
        map.insert("max_cost".to_string(), self.limits.max_cost.to_string());
        map.insert(
            "repetition_window".to_string(),
            self.limits.repetition_window.to_string(),
        );

        map
    }
}

impl fmt::Display for RootscopeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rootscope Configuration:")?;
        writeln!(f, "  Provider: {:?}", self.provider)?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Default Region: {}", self.default_region)?;
        writeln!(f, "  Call Timeout: {}s", self.call_timeout_secs)?;
        writeln!(f, "  Total Timeout: {}s", self.total_timeout_secs)?;
        writeln!(f, "  Max Response Tokens: {}", self.max_response_tokens)?;
        if let Some(ref path) = self.exchange_log {
            writeln!(f, "  Exchange Log: {}", path.display())?;
        }
        writeln!(f, "  Max Handoffs: {}", self.limits.max_handoffs)?;
        writeln!(f, "  Max Tokens: {}", self.limits.max_tokens)?;
        writeln!(f, "  Max Cost: ${:.2}", self.limits.max_cost)?;
        writeln!(f, "  Repetition Window: {}", self.limits.repetition_window)?;
        Ok(())
    }
}
