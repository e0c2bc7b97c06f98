//! # Parley - Dual-Provider Agent Orchestration
//!
//! Parley runs stateful conversational agents against OpenAI and Anthropic
//! behind one normalized contract, and lets several agents collaborate on
//! a shared goal over a bounded number of rounds.
//!
//! ## Features
//!
//! - **Provider normalization**: one message/reply shape for both vendors
//! - **Rate limiting**: independent fixed-window quota per provider
//! - **Bounded memory**: each agent keeps its latest messages (FIFO eviction)
//! - **Collaboration**: round-robin turns with per-turn failure isolation
//! - **Surfaces**: REST API, WebSocket session channel, Prometheus metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::agents::{AgentConfig, AgentHandler};
//! use parley::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::new()?;
//!     let engine = AgentHandler::from_settings(&settings)?;
//!
//!     let agent = engine.registry.create_agent(AgentConfig::new("Planner")).await;
//!     let run = engine
//!         .coordinator
//!         .collaborate(&[agent.id().to_string()], "Outline a launch plan", 2)
//!         .await?;
//!     println!("{} turns", run.turns.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Agents**: the engine (providers, limiter, gateway, registry, coordinator)
//! - **Adapters**: HTTP, WebSocket, health, metrics
//! - **Config**: layered settings and validation

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;

use crate::adapters::api_handler::{self, ApiState};
use crate::adapters::health_handler::HealthHandler;
use crate::adapters::metrics_handler::MetricsHandler;
use crate::adapters::rate_limit::{create_limiter, rate_limit_middleware};
use crate::adapters::session_channel;
use crate::agents::AgentHandler;
use crate::config::RateLimitConfig;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Creates the Axum application router with all endpoints configured.
///
/// # Arguments
///
/// * `engine` - Orchestration engine shared by every route
/// * `rate_limit` - Optional inbound throttle applied to `/api` routes
///
/// # Returns
///
/// Configured Axum Router
pub fn create_app(engine: AgentHandler, rate_limit: Option<&RateLimitConfig>) -> Router {
    let health_handler = Arc::new(HealthHandler::new(engine.gateway.clone()));
    let metrics_handler = Arc::new(MetricsHandler::new(engine.metrics.clone()));
    let state = ApiState { engine };

    let public_router = Router::new()
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }))
        .route("/metrics", get({
            let handler = metrics_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.metrics().await }
            }
        }));

    let mut api_router = Router::new()
        .route(
            "/api/agents",
            get(api_handler::list_agents).post(api_handler::create_agent),
        )
        .route("/api/agents/:id", get(api_handler::get_agent))
        .route("/api/agents/:id/execute", post(api_handler::execute_agent))
        .route("/api/chat", post(api_handler::chat))
        .route("/api/collaborate", post(api_handler::collaborate))
        .route("/api/stats", get(api_handler::get_stats))
        .with_state(state.clone());

    if let Some(config) = rate_limit.filter(|c| c.enabled) {
        tracing::info!(
            requests_per_second = config.requests_per_second,
            burst_size = config.burst_size,
            "Inbound rate limiting enabled"
        );
        let limiter = create_limiter(config.requests_per_second, config.burst_size);
        api_router = api_router.layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ));
    }

    let ws_router = Router::new()
        .route("/ws", get(session_channel::ws_upgrade))
        .with_state(state);

    public_router
        .merge(api_router)
        .merge(ws_router)
        .layer(CorsLayer::permissive())
}
