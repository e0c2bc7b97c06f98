//! Round-robin collaboration between registered agents

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::metrics_handler::MetricsCollector;
use crate::agents::domain::{CollaborationRun, TurnOutcome, TurnRecord};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::CompletionOptions;
use crate::agents::registry::AgentRegistry;

/// Iterations used when the caller does not ask for a number
pub const DEFAULT_ITERATIONS: u32 = 3;

/// Upper bound on iterations for a single run
pub const MAX_ITERATIONS: u32 = 10;

/// Drives a fixed list of agents through a number of rounds.
///
/// Turns run strictly one at a time: every agent in caller order, then the
/// next iteration. A failed turn is recorded and the run carries on.
pub struct CollaborationCoordinator {
    registry: Arc<AgentRegistry>,
    metrics: Arc<MetricsCollector>,
    max_iterations: u32,
}

impl CollaborationCoordinator {
    pub fn new(registry: Arc<AgentRegistry>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            registry,
            metrics,
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run a collaboration to completion
    pub async fn collaborate(
        &self,
        agent_ids: &[String],
        goal: &str,
        iterations: u32,
    ) -> AgentResult<CollaborationRun> {
        if agent_ids.is_empty() {
            return Err(AgentError::Validation(
                "Collaboration needs at least one agent".to_string(),
            ));
        }
        if iterations == 0 || iterations > self.max_iterations {
            return Err(AgentError::Validation(format!(
                "Iterations must be between 1 and {}, got {}",
                self.max_iterations, iterations
            )));
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            agents = agent_ids.len(),
            iterations,
            "Starting collaboration"
        );

        let mut turns: Vec<TurnRecord> = Vec::with_capacity(agent_ids.len() * iterations as usize);
        let mut prompt = initial_prompt(goal);
        let options = CompletionOptions::default();

        for iteration in 1..=iterations {
            for agent_id in agent_ids {
                let agent_name = self
                    .registry
                    .agent_name(agent_id)
                    .await
                    .unwrap_or_else(|| agent_id.clone());

                let outcome = match self.registry.execute_agent(agent_id, &prompt, &options).await {
                    Ok(execution) => TurnOutcome::Ok {
                        response: execution.response,
                    },
                    Err(e) => {
                        tracing::warn!(
                            run_id = %run_id,
                            iteration,
                            agent_id = %agent_id,
                            "Turn failed, continuing: {}",
                            e
                        );
                        TurnOutcome::Err {
                            error: e.to_string(),
                        }
                    }
                };

                turns.push(TurnRecord {
                    iteration,
                    agent_id: agent_id.clone(),
                    agent_name,
                    timestamp: Utc::now(),
                    outcome,
                });

                prompt = round_digest(&turns, agent_ids.len(), goal);
            }
        }

        self.metrics.collaborations.inc();
        let run = CollaborationRun {
            id: run_id,
            goal: goal.to_string(),
            participant_ids: agent_ids.to_vec(),
            iterations,
            turns,
            started_at,
            completed_at: Utc::now(),
        };

        tracing::info!(
            run_id = %run.id,
            turns = run.turns.len(),
            failed = run.failed_turns().count(),
            "Collaboration completed"
        );
        Ok(run)
    }
}

fn initial_prompt(goal: &str) -> String {
    format!(
        "You are collaborating with other agents toward a shared goal.\n\nGoal: {}\n\nProvide your contribution.",
        goal
    )
}

/// Prompt built from the latest `round_size` turns, oldest first
fn round_digest(turns: &[TurnRecord], round_size: usize, goal: &str) -> String {
    let start = turns.len().saturating_sub(round_size);
    let lines: Vec<String> = turns[start..].iter().map(TurnRecord::digest_line).collect();

    format!(
        "Previous responses:\n{}\n\nBuild on these responses to advance the goal: {}",
        lines.join("\n"),
        goal
    )
}
