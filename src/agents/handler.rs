//! Wiring for the orchestration engine

use std::sync::Arc;

use crate::adapters::metrics_handler::MetricsCollector;
use crate::agents::config::ProviderKind;
use crate::agents::llm::{AnthropicProvider, ApiGateway, LlmProvider, OpenAiProvider, RateLimiter};
use crate::agents::orchestration::CollaborationCoordinator;
use crate::agents::registry::AgentRegistry;
use crate::config::{EngineSettings, Settings};

/// Bundle of the engine components shared by every surface
#[derive(Clone)]
pub struct AgentHandler {
    pub gateway: Arc<ApiGateway>,
    pub registry: Arc<AgentRegistry>,
    pub coordinator: Arc<CollaborationCoordinator>,
    pub metrics: Arc<MetricsCollector>,
    pub default_iterations: u32,
}

impl AgentHandler {
    /// Build both provider adapters from settings.
    ///
    /// A provider without a credential is still registered; its calls fail
    /// with a configuration error.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);

        let openai = OpenAiProvider::new(&settings.providers.openai)?;
        let anthropic = AnthropicProvider::new(&settings.providers.anthropic)?;
        let providers: Vec<Arc<dyn LlmProvider>> = vec![Arc::new(openai), Arc::new(anthropic)];

        for provider in &providers {
            if !provider.is_configured() {
                tracing::warn!(
                    "No API key for {}; calls to it will fail until one is configured",
                    provider.kind()
                );
            }
        }

        let limits = ProviderKind::ALL
            .map(|kind| (kind, settings.providers.get(kind).requests_per_minute));

        Ok(Self::with_providers(
            providers,
            RateLimiter::new(limits),
            &settings.engine,
            metrics,
        ))
    }

    /// Assemble the engine around an explicit set of providers
    pub fn with_providers(
        providers: Vec<Arc<dyn LlmProvider>>,
        limiter: RateLimiter,
        engine: &EngineSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let gateway = Arc::new(ApiGateway::new(providers, limiter, metrics.clone()));
        let registry = Arc::new(AgentRegistry::new(gateway.clone(), engine.memory_cap));
        let coordinator = Arc::new(
            CollaborationCoordinator::new(registry.clone(), metrics.clone())
                .with_max_iterations(engine.max_iterations),
        );

        tracing::info!(
            memory_cap = engine.memory_cap,
            max_iterations = engine.max_iterations,
            "Orchestration engine ready"
        );

        Self {
            gateway,
            registry,
            coordinator,
            metrics,
            default_iterations: engine.default_iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_providers_are_still_registered() {
        let mut settings = Settings::default();
        for kind in ProviderKind::ALL {
            let provider = match kind {
                ProviderKind::OpenAI => &mut settings.providers.openai,
                ProviderKind::Anthropic => &mut settings.providers.anthropic,
            };
            provider.api_key = None;
            provider.api_key_env = Some("PARLEY_TEST_NO_SUCH_KEY".to_string());
        }

        let handler = AgentHandler::from_settings(&settings).unwrap();
        assert!(!handler.gateway.is_configured(ProviderKind::OpenAI));
        assert_eq!(
            handler.gateway.default_model(ProviderKind::Anthropic),
            Some("claude-3-sonnet-20240229")
        );
        assert_eq!(
            handler
                .gateway
                .limiter_snapshot(ProviderKind::OpenAI)
                .unwrap()
                .limit,
            60
        );
        assert_eq!(handler.default_iterations, 3);
    }
}
