//! Single entry point for provider calls

use std::collections::HashMap;
use std::sync::Arc;

use super::{CompletionOptions, LlmProvider, NormalizedReply, RateLimiter, WindowSnapshot};
use crate::adapters::metrics_handler::MetricsCollector;
use crate::agents::config::ProviderKind;
use crate::agents::domain::Message;
use crate::agents::error::{LlmError, LlmResult};

/// Routes calls to the adapter for the requested provider.
///
/// Each call passes through hard gates in order: provider validation,
/// credential check, rate-limit admission, then the adapter itself. There
/// is no retry and no fallback to the other provider.
pub struct ApiGateway {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
    limiter: RateLimiter,
    metrics: Arc<MetricsCollector>,
}

impl ApiGateway {
    pub fn new(
        providers: Vec<Arc<dyn LlmProvider>>,
        limiter: RateLimiter,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.kind(), provider))
            .collect();

        Self {
            providers,
            limiter,
            metrics,
        }
    }

    /// Call a provider named by its wire identifier
    pub async fn call(
        &self,
        provider: &str,
        messages: &[Message],
        model: Option<&str>,
        options: &CompletionOptions,
    ) -> LlmResult<NormalizedReply> {
        let kind: ProviderKind = provider.parse()?;
        self.call_provider(kind, messages, model, options).await
    }

    /// Call a provider by kind. `model` falls back to the adapter default.
    pub async fn call_provider(
        &self,
        kind: ProviderKind,
        messages: &[Message],
        model: Option<&str>,
        options: &CompletionOptions,
    ) -> LlmResult<NormalizedReply> {
        let adapter = self
            .providers
            .get(&kind)
            .ok_or_else(|| LlmError::UnsupportedProvider(kind.to_string()))?;

        // a missing credential never touches the limiter
        if !adapter.is_configured() {
            self.metrics.errors.inc();
            return Err(LlmError::Configuration(format!(
                "No API key configured for {}",
                kind
            )));
        }

        if !self.limiter.check_and_reserve(kind) {
            self.metrics.rate_limited.with_label_values(&[kind.as_str()]).inc();
            let retry_after_ms = self.limiter.retry_after(kind).as_millis() as u64;
            tracing::warn!(provider = %kind, retry_after_ms, "Rate limit exceeded");
            return Err(LlmError::RateLimited {
                provider: kind.to_string(),
                retry_after_ms,
            });
        }

        let model = model.unwrap_or_else(|| adapter.default_model());
        match adapter.complete(messages, model, options).await {
            Ok(reply) => {
                self.metrics.record_success(kind, &reply.usage);
                tracing::debug!(
                    provider = %kind,
                    model,
                    prompt_tokens = reply.usage.prompt_tokens,
                    completion_tokens = reply.usage.completion_tokens,
                    "Provider call completed"
                );
                Ok(reply)
            }
            Err(e) => {
                self.metrics.errors.inc();
                tracing::error!(provider = %kind, model, "Provider call failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.providers
            .get(&kind)
            .map(|p| p.is_configured())
            .unwrap_or(false)
    }

    pub fn default_model(&self, kind: ProviderKind) -> Option<&str> {
        self.providers.get(&kind).map(|p| p.default_model())
    }

    pub fn limiter_snapshot(&self, kind: ProviderKind) -> Option<WindowSnapshot> {
        self.limiter.snapshot(kind)
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }
}
