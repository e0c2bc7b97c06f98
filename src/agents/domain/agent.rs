//! Agent domain types

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Message;
use crate::agents::config::ProviderKind;
use crate::agents::llm::TokenUsage;

/// Default number of messages an agent keeps in memory
pub const DEFAULT_MEMORY_CAP: usize = 20;

pub const DEFAULT_AGENT_NAME: &str = "Agent";
pub const DEFAULT_AGENT_ROLE: &str = "Assistant";
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI assistant.";

/// A conversational participant with bounded, ordered memory
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    id: String,
    pub name: String,
    pub role: String,
    pub provider: ProviderKind,
    pub model: String,
    pub instructions: String,
    memory: VecDeque<Message>,
    created_at: DateTime<Utc>,
}

impl Agent {
    pub(crate) fn new(
        name: String,
        role: String,
        provider: ProviderKind,
        model: String,
        instructions: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            role,
            provider,
            model,
            instructions,
            memory: VecDeque::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn memory(&self) -> &VecDeque<Message> {
        &self.memory
    }

    /// Messages for the next call: instructions, memory, then the new input
    pub(crate) fn prompt_for(&self, user_message: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.memory.len() + 2);
        messages.push(Message::system(&self.instructions));
        messages.extend(self.memory.iter().cloned());
        messages.push(Message::user(user_message));
        messages
    }

    /// Append one completed exchange and evict from the front past `cap`
    pub(crate) fn record_exchange(&mut self, user_message: &str, reply: &str, cap: usize) {
        self.memory.push_back(Message::user(user_message));
        self.memory.push_back(Message::assistant(reply));
        while self.memory.len() > cap {
            self.memory.pop_front();
        }
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            provider: self.provider,
            model: self.model.clone(),
            memory_size: self.memory.len(),
            created_at: self.created_at,
        }
    }
}

/// Lightweight view of an agent for listings and events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub role: String,
    pub provider: ProviderKind,
    pub model: String,
    pub memory_size: usize,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful `execute_agent`
#[derive(Debug, Clone, Serialize)]
pub struct AgentExecution {
    pub agent: AgentSummary,
    pub response: String,
    pub usage: TokenUsage,
}
