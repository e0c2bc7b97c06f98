//! Configuration types for agents and providers

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LlmError;

/// Supported LLM providers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    #[default]
    OpenAI,
    /// Anthropic messages
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAI, ProviderKind::Anthropic];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "anthropic" => Ok(ProviderKind::Anthropic),
            _ => Err(LlmError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Caller-supplied configuration for `create_agent`.
///
/// Every field is optional; missing fields fall back to the registry
/// defaults. The provider is kept as a raw string so that an unknown value
/// can fall back to the default provider instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    pub name: Option<String>,
    pub role: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub instructions: Option<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Resolve the requested provider, falling back to the default on
    /// anything unrecognised.
    pub fn resolve_provider(&self) -> ProviderKind {
        match self.provider.as_deref() {
            None => ProviderKind::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Unknown provider '{}' in agent config, falling back to {}",
                    raw,
                    ProviderKind::default()
                );
                ProviderKind::default()
            }),
        }
    }
}

/// Connection settings for one provider
#[derive(Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Inline API key (takes precedence over `api_key_env`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Environment variable containing the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Base URL of the provider API
    pub base_url: String,
    /// Admitted requests per 60 second window
    pub requests_per_minute: u32,
    /// Model used when an agent does not name one
    pub default_model: String,
    /// Transport timeout for a single call
    pub timeout_seconds: u64,
}

impl ProviderConfig {
    pub fn openai_defaults() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            base_url: "https://api.openai.com/v1".to_string(),
            requests_per_minute: 60,
            default_model: "gpt-4".to_string(),
            timeout_seconds: 60,
        }
    }

    pub fn anthropic_defaults() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
            base_url: "https://api.anthropic.com".to_string(),
            requests_per_minute: 50,
            default_model: "claude-3-sonnet-20240229".to_string(),
            timeout_seconds: 60,
        }
    }

    pub fn defaults_for(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAI => Self::openai_defaults(),
            ProviderKind::Anthropic => Self::anthropic_defaults(),
        }
    }

    /// Resolve the credential: inline key first, then the environment.
    /// Empty strings count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
            })
            .filter(|key| !key.trim().is_empty())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("default_model", &self.default_model)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}
