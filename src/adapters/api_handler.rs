//! REST API handlers
//!
//! Thin mappings from HTTP onto the engine: agent CRUD and execution,
//! direct provider chat, collaboration runs, and a JSON stats snapshot.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agents::config::{AgentConfig, ProviderKind};
use crate::agents::domain::{AgentSummary, Message};
use crate::agents::error::{AgentError, LlmError};
use crate::agents::llm::{CompletionOptions, TokenUsage, WindowSnapshot};
use crate::agents::AgentHandler;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: AgentHandler,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn error(message: impl Into<String>, kind: &'static str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            kind: Some(kind),
        }
    }
}

/// Engine error rendered as an HTTP response
pub struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        Self(err)
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        Self(AgentError::Llm(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AgentError::NotFound(_) => StatusCode::NOT_FOUND,
            AgentError::Validation(_) => StatusCode::BAD_REQUEST,
            AgentError::Llm(e) => match e {
                LlmError::UnsupportedProvider(_) => StatusCode::BAD_REQUEST,
                LlmError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                LlmError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                LlmError::Provider { .. } | LlmError::Network(_) | LlmError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<()>::error(self.0.to_string(), self.0.kind());
        let mut response = (status, Json(body)).into_response();

        if let AgentError::Llm(LlmError::RateLimited { retry_after_ms, .. }) = &self.0 {
            let seconds = retry_after_ms.div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub message: String,
    #[serde(default)]
    pub options: CompletionOptions,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub agent: AgentSummary,
    pub response: String,
    pub usage: TokenUsage,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub options: CompletionOptions,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub provider: ProviderKind,
    pub content: String,
    pub usage: TokenUsage,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborateRequest {
    pub agent_ids: Vec<String>,
    pub goal: String,
    #[serde(default)]
    pub iterations: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub requests: BTreeMap<ProviderKind, u64>,
    pub errors: u64,
    pub agents: usize,
    pub collaborations: u64,
    pub limits: BTreeMap<ProviderKind, WindowSnapshot>,
}

// ============================================================================
// Agents
// ============================================================================

/// GET /api/agents
pub async fn list_agents(State(state): State<ApiState>) -> impl IntoResponse {
    let agents = state.engine.registry.list_agents().await;
    (StatusCode::OK, Json(ApiResponse::success(agents)))
}

/// POST /api/agents
pub async fn create_agent(
    State(state): State<ApiState>,
    Json(config): Json<AgentConfig>,
) -> impl IntoResponse {
    let agent = state.engine.registry.create_agent(config).await;
    (StatusCode::CREATED, Json(ApiResponse::success(agent)))
}

/// GET /api/agents/:id
pub async fn get_agent(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let agent = state.engine.registry.get_agent(&id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(agent))))
}

/// POST /api/agents/:id/execute
pub async fn execute_agent(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<impl IntoResponse> {
    let execution = state
        .engine
        .registry
        .execute_agent(&id, &request.message, &request.options)
        .await?;

    let body = ExecuteResponse {
        agent: execution.agent,
        response: execution.response,
        usage: execution.usage,
        timestamp: Utc::now(),
    };
    Ok((StatusCode::OK, Json(ApiResponse::success(body))))
}

// ============================================================================
// Direct provider access
// ============================================================================

/// POST /api/chat
pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let provider: ProviderKind = request.provider.parse()?;
    if request.messages.is_empty() {
        return Err(AgentError::Validation("messages must not be empty".to_string()).into());
    }

    let reply = state
        .engine
        .gateway
        .call_provider(
            provider,
            &request.messages,
            request.model.as_deref(),
            &request.options,
        )
        .await?;

    let body = ChatResponse {
        provider,
        content: reply.content,
        usage: reply.usage,
        timestamp: Utc::now(),
    };
    Ok((StatusCode::OK, Json(ApiResponse::success(body))))
}

// ============================================================================
// Collaboration
// ============================================================================

/// POST /api/collaborate
pub async fn collaborate(
    State(state): State<ApiState>,
    Json(request): Json<CollaborateRequest>,
) -> ApiResult<impl IntoResponse> {
    let iterations = request
        .iterations
        .unwrap_or(state.engine.default_iterations);

    let run = state
        .engine
        .coordinator
        .collaborate(&request.agent_ids, &request.goal, iterations)
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(run))))
}

// ============================================================================
// Stats
// ============================================================================

/// GET /api/stats
pub async fn get_stats(State(state): State<ApiState>) -> impl IntoResponse {
    let metrics = &state.engine.metrics;
    let gateway = &state.engine.gateway;

    let stats = StatsResponse {
        requests: ProviderKind::ALL
            .iter()
            .map(|kind| (*kind, metrics.requests_for(*kind)))
            .collect(),
        errors: metrics.error_count(),
        agents: state.engine.registry.agent_count().await,
        collaborations: metrics.collaborations.get() as u64,
        limits: ProviderKind::ALL
            .iter()
            .filter_map(|kind| gateway.limiter_snapshot(*kind).map(|s| (*kind, s)))
            .collect(),
    };

    (StatusCode::OK, Json(ApiResponse::success(stats)))
}
