//! Anthropic LLM Provider

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{split_usage, CompletionOptions, LlmProvider, NormalizedReply};
use crate::agents::config::{ProviderConfig, ProviderKind};
use crate::agents::domain::{Message, Role};
use crate::agents::error::{LlmError, LlmResult};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic LLM Provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from configuration
    pub fn new(config: &ProviderConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.resolve_api_key(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.default_model.clone(),
        })
    }

    /// Build the request body for Anthropic API
    fn build_request_body(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> Value {
        let (system_prompt, messages) = self.convert_messages(messages);

        let mut body = json!({
            "model": model,
            "messages": messages,
        });

        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }

        options.apply_to(&mut body);
        body
    }

    /// Convert internal messages to Anthropic format.
    /// Returns (system_prompt, messages); every system message is lifted
    /// out and joined with newlines, the rest keep their relative order.
    fn convert_messages(&self, messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut converted = Vec::new();

        for m in messages {
            match m.role {
                Role::System => system_parts.push(m.content.as_str()),
                Role::User | Role::Assistant => converted.push(json!({
                    "role": m.role.as_str(),
                    "content": m.content
                })),
            }
        }

        let system_prompt = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n"))
        };

        (system_prompt, converted)
    }

    /// Parse a non-streaming response
    fn parse_response(&self, response: AnthropicResponse) -> LlmResult<NormalizedReply> {
        if response.content.is_empty() {
            return Err(LlmError::Parse("No content blocks in response".to_string()));
        }

        let content = response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<String>();

        Ok(NormalizedReply {
            content,
            usage: split_usage(
                response.usage.unwrap_or_default(),
                "input_tokens",
                "output_tokens",
            ),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> LlmResult<NormalizedReply> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LlmError::Configuration("Anthropic API key not configured".to_string())
        })?;

        let body = self.build_request_body(messages, model, options);
        tracing::debug!(model, messages = messages.len(), "Sending Anthropic message");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body: error_text,
            });
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))?;

        self.parse_response(anthropic_response)
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}
