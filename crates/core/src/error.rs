use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure reported by an agent substrate round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubstrateError {
    ApiError {
        message: String,
        status_code: Option<u16>,
    },
    AuthenticationError {
        message: String,
    },
    TimeoutError {
        seconds: u64,
    },
    RateLimitError {
        retry_after: Option<u64>,
    },
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },
    ConfigurationError {
        message: String,
    },
    /// A scripted or replayed substrate has no answer for the request
    Exhausted {
        message: String,
    },
    Other {
        message: String,
    },
}

impl SubstrateError {
    pub fn other(message: impl Into<String>) -> Self {
        SubstrateError::Other {
            message: message.into(),
        }
    }
}

impl fmt::Display for SubstrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstrateError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Substrate API error ({}): {}", code, message)
                } else {
                    write!(f, "Substrate API error: {}", message)
                }
            }
            SubstrateError::AuthenticationError { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            SubstrateError::TimeoutError { seconds } => {
                write!(f, "Substrate call timed out after {} seconds", seconds)
            }
            SubstrateError::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            SubstrateError::InvalidResponse { message, .. } => {
                write!(f, "Invalid substrate response: {}", message)
            }
            SubstrateError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            SubstrateError::Exhausted { message } => {
                write!(f, "Substrate exhausted: {}", message)
            }
            SubstrateError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for SubstrateError {}
