//! Collaboration run records

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a single turn ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Ok { response: String },
    Err { error: String },
}

impl TurnOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, TurnOutcome::Ok { .. })
    }
}

/// One agent's execution within one iteration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub iteration: u32,
    pub agent_id: String,
    /// Display name at the time of the turn; the id when the agent is unknown
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: TurnOutcome,
}

impl TurnRecord {
    /// Name-tagged line used when composing the next prompt
    pub fn digest_line(&self) -> String {
        match &self.outcome {
            TurnOutcome::Ok { response } => format!("{}: {}", self.agent_name, response),
            TurnOutcome::Err { error } => {
                format!("{}: [no response: {}]", self.agent_name, error)
            }
        }
    }
}

/// A finished collaboration, handed to the caller by value
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationRun {
    pub id: String,
    pub goal: String,
    pub participant_ids: Vec<String>,
    pub iterations: u32,
    pub turns: Vec<TurnRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CollaborationRun {
    pub fn failed_turns(&self) -> impl Iterator<Item = &TurnRecord> {
        self.turns.iter().filter(|t| !t.outcome.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_record_serializes_flat_outcome() {
        let record = TurnRecord {
            iteration: 2,
            agent_id: "a-1".to_string(),
            agent_name: "Critic".to_string(),
            timestamp: Utc::now(),
            outcome: TurnOutcome::Err {
                error: "Rate limit exceeded".to_string(),
            },
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], json!("err"));
        assert_eq!(value["error"], json!("Rate limit exceeded"));
        assert_eq!(value["agentId"], json!("a-1"));
        assert!(value.get("response").is_none());
    }

    #[test]
    fn test_digest_line_tags_with_agent_name() {
        let record = TurnRecord {
            iteration: 1,
            agent_id: "a-1".to_string(),
            agent_name: "Planner".to_string(),
            timestamp: Utc::now(),
            outcome: TurnOutcome::Ok {
                response: "Split the work.".to_string(),
            },
        };
        assert_eq!(record.digest_line(), "Planner: Split the work.");
    }
}
