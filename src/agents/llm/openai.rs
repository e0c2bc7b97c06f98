//! OpenAI LLM Provider

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{split_usage, CompletionOptions, LlmProvider, NormalizedReply};
use crate::agents::config::{ProviderConfig, ProviderKind};
use crate::agents::domain::Message;
use crate::agents::error::{LlmError, LlmResult};

/// OpenAI LLM Provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// A missing credential is not an error here; calls fail with
    /// [`LlmError::Configuration`] instead, so the other provider keeps
    /// working.
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

    /// Build the request body for OpenAI API.
    ///
    /// Messages pass through unchanged, system messages included.
    fn build_request_body(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> Value {
        let mut body = json!({
            "model": model,
            "messages": messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                .collect::<Vec<_>>(),
        });
        options.apply_to(&mut body);
        body
    }

    /// Parse a non-streaming response
    fn parse_response(&self, response: OpenAiResponse) -> LlmResult<NormalizedReply> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("No choices in response".to_string()))?;

        Ok(NormalizedReply {
            content: choice.message.content.unwrap_or_default(),
            usage: split_usage(
                response.usage.unwrap_or_default(),
                "prompt_tokens",
                "completion_tokens",
            ),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
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
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Configuration("OpenAI API key not configured".to_string()))?;

        let body = self.build_request_body(messages, model, options);
        tracing::debug!(model, messages = messages.len(), "Sending OpenAI chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
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

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))?;

        self.parse_response(openai_response)
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
    usage: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::llm::testing::spawn_stub_server;
    use crate::agents::llm::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
    use axum::http::StatusCode;

    fn provider(base_url: &str, api_key: Option<&str>) -> OpenAiProvider {
        let mut config = ProviderConfig::openai_defaults();
        config.base_url = base_url.to_string();
        config.api_key = api_key.map(str::to_string);
        config.api_key_env = None;
        OpenAiProvider::new(&config).unwrap()
    }

    fn canned_reply() -> Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Hello from GPT" },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 21,
                "completion_tokens": 4,
                "total_tokens": 25,
                "completion_tokens_details": { "reasoning_tokens": 0 }
            }
        })
    }

    #[test]
    fn test_request_keeps_interleaved_system_messages() {
        let p = provider("http://unused", Some("sk"));
        let messages = vec![
            Message::system("Be brief."),
            Message::user("Hi"),
            Message::system("Answer in French."),
        ];
        let body = p.build_request_body(&messages, "gpt-4", &CompletionOptions::default());

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["messages"][2]["role"], "system");
        assert_eq!(body["messages"][2]["content"], "Answer in French.");
        assert_eq!(body["temperature"], json!(DEFAULT_TEMPERATURE));
        assert_eq!(body["max_tokens"], json!(DEFAULT_MAX_TOKENS));
    }

    #[test]
    fn test_parse_response_extracts_first_choice() {
        let p = provider("http://unused", Some("sk"));
        let response: OpenAiResponse = serde_json::from_value(canned_reply()).unwrap();
        let reply = p.parse_response(response).unwrap();

        assert_eq!(reply.content, "Hello from GPT");
        assert_eq!(reply.usage.prompt_tokens, 21);
        assert_eq!(reply.usage.completion_tokens, 4);
        assert_eq!(reply.usage.total_tokens, 25);
        assert!(reply.usage.extra.contains_key("completion_tokens_details"));
    }

    #[test]
    fn test_parse_response_without_choices_is_parse_error() {
        let p = provider("http://unused", Some("sk"));
        let response: OpenAiResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(p.parse_response(response), Err(LlmError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        // nothing listens on port 9; a network attempt would be a Network error
        let p = provider("http://127.0.0.1:9", None);
        assert!(!p.is_configured());
        let err = p
            .complete(&[Message::user("hi")], "gpt-4", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_complete_round_trip_against_stub() {
        let (base_url, seen) =
            spawn_stub_server("/chat/completions", StatusCode::OK, canned_reply()).await;
        let p = provider(&base_url, Some("sk-test"));

        let reply = p
            .complete(
                &[Message::system("sys"), Message::user("Hi")],
                "gpt-4o",
                &CompletionOptions::default().with_temperature(0.2),
            )
            .await
            .unwrap();
        assert_eq!(reply.content, "Hello from GPT");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].headers["authorization"], "Bearer sk-test");
        assert_eq!(seen[0].body["model"], "gpt-4o");
        assert_eq!(seen[0].body["temperature"], json!(0.2));
    }

    #[tokio::test]
    async fn test_non_success_status_becomes_provider_error() {
        let (base_url, _) = spawn_stub_server(
            "/chat/completions",
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": { "message": "slow down" } }),
        )
        .await;
        let p = provider(&base_url, Some("sk-test"));

        let err = p
            .complete(&[Message::user("Hi")], "gpt-4", &CompletionOptions::default())
            .await
            .unwrap_err();
        match err {
            LlmError::Provider {
                status,
                status_text,
                body,
            } => {
                assert_eq!(status, 429);
                assert_eq!(status_text, "Too Many Requests");
                assert!(body.contains("slow down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
