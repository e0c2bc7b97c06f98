//! LLM provider layer
//!
//! This module normalizes two incompatible chat APIs behind one contract:
//! - OpenAI (chat completions, system messages inline)
//! - Anthropic (messages API, system prompt as a top-level field)
//!
//! The [`ApiGateway`] sits in front of both adapters and enforces the
//! per-provider [`RateLimiter`] before any network call is attempted.

mod anthropic;
mod gateway;
mod limiter;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gateway::ApiGateway;
pub use limiter::{Clock, RateLimiter, SystemClock, WindowSnapshot, WINDOW_LENGTH_MS};
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::config::ProviderKind;
use crate::agents::domain::Message;
use crate::agents::error::LlmResult;

/// Sampling temperature sent when the caller does not supply one
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Completion budget sent when the caller does not supply one
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Trait implemented by each provider adapter
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which provider this adapter speaks to
    fn kind(&self) -> ProviderKind;

    /// Model used when the caller does not name one
    fn default_model(&self) -> &str;

    /// Whether a credential is available
    fn is_configured(&self) -> bool;

    /// Translate, send, and normalize one chat completion
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> LlmResult<NormalizedReply>;
}

/// Per-call options. Unknown keys are passed through to the provider
/// request body after the defaults, so callers can override anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(
        default,
        alias = "maxTokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_tokens: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Apply defaults, then the caller's options (last write wins).
    pub(crate) fn apply_to(&self, body: &mut Value) {
        body["temperature"] = serde_json::json!(self.temperature.unwrap_or(DEFAULT_TEMPERATURE));
        body["max_tokens"] = serde_json::json!(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS));

        if let Some(obj) = body.as_object_mut() {
            for (key, value) in &self.extra {
                obj.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Token usage reported by a provider.
///
/// Provider-specific counters that have no common name are kept verbatim
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provider-agnostic reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReply {
    pub content: String,
    pub usage: TokenUsage,
}

/// Split a provider usage object into the common counters and the rest.
pub(crate) fn split_usage(
    mut raw: Map<String, Value>,
    prompt_key: &str,
    completion_key: &str,
) -> TokenUsage {
    let take = |raw: &mut Map<String, Value>, key: &str| {
        raw.remove(key).and_then(|v| v.as_u64()).unwrap_or(0)
    };

    let prompt_tokens = take(&mut raw, prompt_key);
    let completion_tokens = take(&mut raw, completion_key);
    let total_tokens = raw
        .remove("total_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(prompt_tokens + completion_tokens);

    TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens,
        extra: raw,
    }
}
