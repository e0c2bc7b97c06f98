use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::config::ProviderKind;
use crate::agents::llm::ApiGateway;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub providers: ProviderChecks,
}

/// Whether each provider has a credential
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderChecks {
    pub openai: bool,
    pub anthropic: bool,
}

pub struct HealthHandler {
    gateway: Arc<ApiGateway>,
    start_time: std::time::Instant,
}

impl HealthHandler {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            gateway,
            start_time: std::time::Instant::now(),
        }
    }

    /// Basic health check - returns 200 if server is running.
    ///
    /// Reports `degraded` when neither provider has a credential.
    pub async fn health(&self) -> impl IntoResponse {
        let providers = ProviderChecks {
            openai: self.gateway.is_configured(ProviderKind::OpenAI),
            anthropic: self.gateway.is_configured(ProviderKind::Anthropic),
        };
        let status = if providers.openai || providers.anthropic {
            "healthy"
        } else {
            "degraded"
        };

        let body = HealthStatus {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            providers,
        };

        (StatusCode::OK, Json(body))
    }

    /// Liveness check - returns 200 if server is alive
    pub async fn live(&self) -> impl IntoResponse {
        (StatusCode::OK, Json(serde_json::json!({
            "status": "alive",
            "message": "Server is alive"
        })))
    }
}
