//! Dual-provider orchestration engine
//!
//! This module provides:
//! - A provider layer normalizing OpenAI and Anthropic chat APIs
//! - Per-provider fixed-window rate limiting in front of every call
//! - Agents with bounded FIFO memory, owned by a registry
//! - Round-robin multi-agent collaboration with per-turn failure isolation
//!
//! ## Architecture
//!
//! - `domain/` - Core types (Message, Agent, CollaborationRun)
//! - `llm/` - Provider adapters, rate limiter, gateway
//! - `registry` - Agent ownership and single-turn execution
//! - `orchestration/` - Collaboration coordinator

pub mod config;
pub mod domain;
pub mod error;
pub mod handler;
pub mod llm;
pub mod orchestration;
pub mod registry;

// Re-export commonly used types
pub use config::*;
pub use domain::*;
pub use error::*;
pub use handler::AgentHandler;
pub use registry::AgentRegistry;
