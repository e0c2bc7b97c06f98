use prometheus::{Counter, CounterVec, Encoder, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::agents::config::ProviderKind;
use crate::agents::llm::TokenUsage;

/// Engine counters, owned per instance rather than registered globally.
pub struct MetricsCollector {
    registry: Registry,

    // Provider metrics
    pub provider_requests: CounterVec,
    pub rate_limited: CounterVec,
    pub tokens: CounterVec,
    pub errors: Counter,

    // Engine metrics
    pub agents: IntGauge,
    pub collaborations: Counter,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let provider_requests = CounterVec::new(
            Opts::new(
                "parley_provider_requests_total",
                "Successfully completed provider calls",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(provider_requests.clone()))?;

        let rate_limited = CounterVec::new(
            Opts::new(
                "parley_rate_limited_total",
                "Calls rejected by the per-provider rate limiter",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(rate_limited.clone()))?;

        let tokens = CounterVec::new(
            Opts::new("parley_tokens_total", "Tokens reported by providers"),
            &["provider", "kind"],
        )?;
        registry.register(Box::new(tokens.clone()))?;

        let errors = Counter::new("parley_errors_total", "Failed provider calls")?;
        registry.register(Box::new(errors.clone()))?;

        let agents = IntGauge::new("parley_agents", "Registered agents")?;
        registry.register(Box::new(agents.clone()))?;

        let collaborations = Counter::new(
            "parley_collaborations_total",
            "Completed collaboration runs",
        )?;
        registry.register(Box::new(collaborations.clone()))?;

        Ok(Self {
            registry,
            provider_requests,
            rate_limited,
            tokens,
            errors,
            agents,
            collaborations,
        })
    }

    pub fn record_success(&self, provider: ProviderKind, usage: &TokenUsage) {
        let label = provider.as_str();
        self.provider_requests.with_label_values(&[label]).inc();
        self.tokens
            .with_label_values(&[label, "prompt"])
            .inc_by(usage.prompt_tokens as f64);
        self.tokens
            .with_label_values(&[label, "completion"])
            .inc_by(usage.completion_tokens as f64);
    }

    pub fn requests_for(&self, provider: ProviderKind) -> u64 {
        self.provider_requests
            .with_label_values(&[provider.as_str()])
            .get() as u64
    }

    pub fn error_count(&self) -> u64 {
        self.errors.get() as u64
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub struct MetricsHandler {
    collector: Arc<MetricsCollector>,
}

impl MetricsHandler {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    pub async fn metrics(&self) -> String {
        self.collector.encode().unwrap_or_else(|e| {
            tracing::error!("Failed to encode metrics: {}", e);
            String::from("# Error encoding metrics\n")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        assert!(collector.is_ok());
    }

    #[test]
    fn test_two_collectors_do_not_share_state() {
        let a = MetricsCollector::new().unwrap();
        let b = MetricsCollector::new().unwrap();
        a.errors.inc();
        assert_eq!(a.error_count(), 1);
        assert_eq!(b.error_count(), 0);
    }

    #[test]
    fn test_record_success_counts_requests_and_tokens() {
        let collector = MetricsCollector::new().unwrap();
        let usage = TokenUsage {
            prompt_tokens: 12,
            completion_tokens: 3,
            total_tokens: 15,
            extra: Default::default(),
        };
        collector.record_success(ProviderKind::Anthropic, &usage);
        collector.record_success(ProviderKind::Anthropic, &usage);

        assert_eq!(collector.requests_for(ProviderKind::Anthropic), 2);
        assert_eq!(collector.requests_for(ProviderKind::OpenAI), 0);
        assert_eq!(
            collector
                .tokens
                .with_label_values(&["anthropic", "prompt"])
                .get(),
            24.0
        );
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let collector = Arc::new(MetricsCollector::new().unwrap());
        let handler = MetricsHandler::new(collector.clone());

        collector.errors.inc();
        collector.agents.set(3);

        let metrics = handler.metrics().await;
        assert!(metrics.contains("parley_errors_total 1"));
        assert!(metrics.contains("parley_agents 3"));
    }
}
