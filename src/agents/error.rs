//! Error types for the orchestration engine

use thiserror::Error;

/// Errors that can occur during agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent not found
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// LLM provider error
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AgentError {
    /// Stable machine-readable name for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::NotFound(_) => "agent_not_found",
            AgentError::Llm(e) => e.kind(),
            AgentError::Validation(_) => "validation",
        }
    }
}

/// Errors raised by the provider layer (gateway, limiter, adapters)
#[derive(Debug, Error)]
pub enum LlmError {
    /// Credential for the provider is missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller asked for a provider the engine does not know
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Per-provider quota for the current window is exhausted
    #[error("Rate limit exceeded for {provider}: retry after {retry_after_ms}ms")]
    RateLimited { provider: String, retry_after_ms: u64 },

    /// Upstream answered with a non-success status
    #[error("Provider error: {status} {status_text}")]
    Provider {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Transport failed before any HTTP status was received
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream reply could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl LlmError {
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Configuration(_) => "configuration",
            LlmError::UnsupportedProvider(_) => "unsupported_provider",
            LlmError::RateLimited { .. } => "rate_limited",
            LlmError::Provider { .. } => "provider",
            LlmError::Network(_) => "network",
            LlmError::Parse(_) => "parse",
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection error: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;
