//! Agent registry: creation, lookup, and single-turn execution

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{Mutex, RwLock};

use crate::agents::config::{AgentConfig, ProviderConfig};
use crate::agents::domain::{
    Agent, AgentExecution, AgentSummary, DEFAULT_AGENT_NAME, DEFAULT_AGENT_ROLE,
    DEFAULT_INSTRUCTIONS,
};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{ApiGateway, CompletionOptions};

/// One registered agent.
///
/// `turn` serializes executions and is held across the provider call.
/// `state` is only locked briefly, never across I/O, so reads don't wait
/// on a running call.
struct AgentEntry {
    seq: u64,
    turn: Mutex<()>,
    state: StdRwLock<Agent>,
}

impl AgentEntry {
    fn read(&self) -> RwLockReadGuard<'_, Agent> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Agent> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns every agent for the lifetime of the process.
///
/// Concurrent calls against the same agent serialize, and memory never
/// sees a half-applied exchange.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<AgentEntry>>>,
    next_seq: AtomicU64,
    gateway: Arc<ApiGateway>,
    memory_cap: usize,
}

impl AgentRegistry {
    pub fn new(gateway: Arc<ApiGateway>, memory_cap: usize) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            gateway,
            memory_cap: memory_cap.max(1),
        }
    }

    /// Create an agent, filling in defaults for anything not supplied
    pub async fn create_agent(&self, config: AgentConfig) -> Agent {
        let provider = config.resolve_provider();
        let model = config.model.unwrap_or_else(|| {
            self.gateway
                .default_model(provider)
                .map(str::to_string)
                .unwrap_or_else(|| ProviderConfig::defaults_for(provider).default_model)
        });

        let agent = Agent::new(
            config.name.unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
            config.role.unwrap_or_else(|| DEFAULT_AGENT_ROLE.to_string()),
            provider,
            model,
            config
                .instructions
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
        );

        let mut agents = self.agents.write().await;
        let entry = AgentEntry {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            turn: Mutex::new(()),
            state: StdRwLock::new(agent.clone()),
        };
        agents.insert(agent.id().to_string(), Arc::new(entry));
        self.gateway.metrics().agents.set(agents.len() as i64);

        tracing::info!(
            agent_id = agent.id(),
            name = %agent.name,
            provider = %agent.provider,
            model = %agent.model,
            "Agent created"
        );
        agent
    }

    async fn lookup(&self, agent_id: &str) -> AgentResult<Arc<AgentEntry>> {
        self.agents
            .read()
            .await
            .get(agent_id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(agent_id.to_string()))
    }

    /// Run one exchange against an agent.
    ///
    /// Memory is updated only when the provider call succeeds, and then
    /// with both the user message and the reply.
    pub async fn execute_agent(
        &self,
        agent_id: &str,
        user_message: &str,
        options: &CompletionOptions,
    ) -> AgentResult<AgentExecution> {
        let entry = self.lookup(agent_id).await?;
        let _turn = entry.turn.lock().await;

        let (provider, model, messages) = {
            let agent = entry.read();
            (agent.provider, agent.model.clone(), agent.prompt_for(user_message))
        };
        let reply = self
            .gateway
            .call_provider(provider, &messages, Some(&model), options)
            .await?;

        let summary = {
            let mut agent = entry.write();
            agent.record_exchange(user_message, &reply.content, self.memory_cap);
            agent.summary()
        };
        tracing::debug!(
            agent_id,
            memory_size = summary.memory_size,
            "Agent exchange recorded"
        );

        Ok(AgentExecution {
            agent: summary,
            response: reply.content,
            usage: reply.usage,
        })
    }

    /// Snapshot of an agent including its memory
    pub async fn get_agent(&self, agent_id: &str) -> AgentResult<Agent> {
        let entry = self.lookup(agent_id).await?;
        let agent = entry.read().clone();
        Ok(agent)
    }

    /// Display name for an agent, if it exists
    pub async fn agent_name(&self, agent_id: &str) -> Option<String> {
        let entry = self.lookup(agent_id).await.ok()?;
        let name = entry.read().name.clone();
        Some(name)
    }

    /// All agents in creation order
    pub async fn list_agents(&self) -> Vec<AgentSummary> {
        let mut entries: Vec<_> = self.agents.read().await.values().cloned().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.iter().map(|entry| entry.read().summary()).collect()
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }

    pub fn memory_cap(&self) -> usize {
        self.memory_cap
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::metrics_handler::MetricsCollector;
    use crate::agents::config::ProviderKind;
    use crate::agents::domain::{Role, DEFAULT_MEMORY_CAP};
    use crate::agents::error::LlmError;
    use crate::agents::llm::testing::ScriptedProvider;
    use crate::agents::llm::{LlmProvider, RateLimiter};

    pub fn registry_with(providers: Vec<Arc<ScriptedProvider>>, limit: u32) -> AgentRegistry {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let limiter = RateLimiter::new(ProviderKind::ALL.map(|k| (k, limit)));
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn LlmProvider>)
            .collect();
        let gateway = Arc::new(ApiGateway::new(providers, limiter, metrics));
        AgentRegistry::new(gateway, DEFAULT_MEMORY_CAP)
    }

    #[tokio::test]
    async fn test_create_agent_applies_defaults() {
        let registry = registry_with(
            vec![Arc::new(ScriptedProvider::replying(ProviderKind::OpenAI, "ok"))],
            100,
        );

        let agent = registry.create_agent(AgentConfig::default()).await;
        assert_eq!(agent.name, DEFAULT_AGENT_NAME);
        assert_eq!(agent.role, DEFAULT_AGENT_ROLE);
        assert_eq!(agent.provider, ProviderKind::OpenAI);
        assert_eq!(agent.model, "scripted-model");
        assert_eq!(agent.instructions, DEFAULT_INSTRUCTIONS);
        assert!(agent.memory().is_empty());
        assert_eq!(registry.agent_count().await, 1);
    }

    #[tokio::test]
    async fn test_execute_unknown_agent_is_not_found() {
        let registry = registry_with(vec![], 100);
        let err = registry
            .execute_agent("missing", "hi", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_memory_is_capped_to_most_recent_messages() {
        let registry = registry_with(
            vec![Arc::new(ScriptedProvider::new(ProviderKind::OpenAI, |messages| {
                Ok(format!("re: {}", messages.last().unwrap().content))
            }))],
            100,
        );
        let agent = registry.create_agent(AgentConfig::new("Echo")).await;

        for i in 0..15 {
            registry
                .execute_agent(agent.id(), &format!("m{i}"), &CompletionOptions::default())
                .await
                .unwrap();
        }

        let agent = registry.get_agent(agent.id()).await.unwrap();
        let memory: Vec<_> = agent.memory().iter().cloned().collect();
        assert_eq!(memory.len(), 20);

        // exchanges 5..15 survive, in order
        let expected: Vec<_> = (5..15)
            .flat_map(|i| {
                [
                    crate::agents::domain::Message::user(format!("m{i}")),
                    crate::agents::domain::Message::assistant(format!("re: m{i}")),
                ]
            })
            .collect();
        assert_eq!(memory, expected);
    }

    #[tokio::test]
    async fn test_failed_call_leaves_memory_untouched() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = registry_with(
            vec![Arc::new(ScriptedProvider::new(ProviderKind::OpenAI, move |_| {
                if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 {
                    Ok("fine".to_string())
                } else {
                    Err(LlmError::Provider {
                        status: 502,
                        status_text: "Bad Gateway".to_string(),
                        body: String::new(),
                    })
                }
            }))],
            100,
        );
        let agent = registry.create_agent(AgentConfig::new("Flaky")).await;
        for _ in 0..2 {
            registry
                .execute_agent(agent.id(), "ok?", &CompletionOptions::default())
                .await
                .unwrap();
        }
        let before = registry.get_agent(agent.id()).await.unwrap().memory().clone();

        let err = registry
            .execute_agent(agent.id(), "this one fails", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Llm(LlmError::Provider { status: 502, .. })));

        let after = registry.get_agent(agent.id()).await.unwrap().memory().clone();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_rate_limited_call_leaves_memory_untouched() {
        let registry = registry_with(
            vec![Arc::new(ScriptedProvider::replying(ProviderKind::Anthropic, "ok"))],
            1,
        );
        let agent = registry
            .create_agent(AgentConfig::new("Limited").with_provider("anthropic"))
            .await;

        registry
            .execute_agent(agent.id(), "one", &CompletionOptions::default())
            .await
            .unwrap();
        let err = registry
            .execute_agent(agent.id(), "two", &CompletionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "rate_limited");
        assert_eq!(registry.get_agent(agent.id()).await.unwrap().memory().len(), 2);
    }

    #[tokio::test]
    async fn test_execute_sends_instructions_memory_and_input() {
        let provider = Arc::new(ScriptedProvider::replying(ProviderKind::OpenAI, "noted"));
        let registry = registry_with(vec![provider.clone()], 100);
        let agent = registry
            .create_agent(AgentConfig::new("Scribe").with_instructions("Take notes."))
            .await;

        registry
            .execute_agent(agent.id(), "first", &CompletionOptions::default())
            .await
            .unwrap();
        let execution = registry
            .execute_agent(agent.id(), "second", &CompletionOptions::default())
            .await
            .unwrap();

        let sent = provider.last_call();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[0].content, "Take notes.");
        assert_eq!(sent[3].content, "second");
        assert_eq!(execution.response, "noted");
        assert_eq!(execution.agent.memory_size, 4);
        assert_eq!(execution.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn test_concurrent_executions_on_one_agent_serialize() {
        let registry = Arc::new(registry_with(
            vec![Arc::new(ScriptedProvider::replying(ProviderKind::OpenAI, "ack"))],
            1000,
        ));
        let agent = registry.create_agent(AgentConfig::new("Busy")).await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                let id = agent.id().to_string();
                tokio::spawn(async move {
                    registry
                        .execute_agent(&id, &format!("msg {i}"), &CompletionOptions::default())
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let memory = registry.get_agent(agent.id()).await.unwrap().memory().clone();
        assert_eq!(memory.len(), 16);
        // every user message is immediately followed by its reply
        for pair in memory.iter().collect::<Vec<_>>().chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    #[tokio::test]
    async fn test_list_agents_in_creation_order() {
        let registry = registry_with(vec![], 100);
        let mut created = Vec::new();
        for name in ["first", "second", "third", "fourth"] {
            created.push(registry.create_agent(AgentConfig::new(name)).await.id().to_string());
        }

        let listed: Vec<String> = registry.list_agents().await.into_iter().map(|a| a.id).collect();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn test_reads_do_not_wait_on_running_call() {
        let provider = Arc::new(
            ScriptedProvider::replying(ProviderKind::OpenAI, "late")
                .with_delay(std::time::Duration::from_secs(2)),
        );
        let registry = Arc::new(registry_with(vec![provider], 100));
        let agent = registry.create_agent(AgentConfig::new("Slow")).await;

        let running = {
            let registry = registry.clone();
            let id = agent.id().to_string();
            tokio::spawn(async move {
                registry
                    .execute_agent(&id, "take your time", &CompletionOptions::default())
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        let listed = registry.list_agents().await;
        let name = registry.agent_name(agent.id()).await;
        let snapshot = registry.get_agent(agent.id()).await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_millis(500));

        assert_eq!(listed[0].memory_size, 0);
        assert_eq!(name.as_deref(), Some("Slow"));
        assert!(snapshot.memory().is_empty());

        let execution = running.await.unwrap().unwrap();
        assert_eq!(execution.agent.memory_size, 2);
    }
}
