//! WebSocket session channel
//!
//! Each connection gets a [`SessionChannel`] that turns inbound typed JSON
//! messages into engine calls and answers with one typed event per
//! request. Application errors become `error` events; the socket stays
//! open. Messages on one connection are handled strictly in order, so a
//! running collaboration holds back later messages from the same client.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::adapters::api_handler::ApiState;
use crate::agents::domain::{AgentSummary, CollaborationRun};
use crate::agents::llm::{CompletionOptions, TokenUsage};
use crate::agents::AgentHandler;

/// Outbound event kinds
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Connected {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Pong,
    AgentResponse {
        agent: AgentSummary,
        response: String,
        usage: TokenUsage,
    },
    CollaborationResult {
        collaboration: CollaborationRun,
    },
    Error {
        message: String,
    },
}

impl OutboundEvent {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundEvent::Error {
            message: message.into(),
        }
    }

    /// Stamp with the delivery time
    pub fn stamped(self) -> StampedEvent {
        StampedEvent {
            event: self,
            timestamp: Utc::now(),
        }
    }
}

/// Wire form of an outbound event
#[derive(Debug, Clone, Serialize)]
pub struct StampedEvent {
    #[serde(flatten)]
    pub event: OutboundEvent,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundEvent {
    Ping,
    ExecuteAgent {
        #[serde(rename = "agentId")]
        agent_id: String,
        message: String,
        #[serde(default)]
        context: Option<CompletionOptions>,
    },
    StartCollaboration {
        #[serde(rename = "agentIds")]
        agent_ids: Vec<String>,
        goal: String,
        #[serde(default)]
        iterations: Option<u32>,
    },
}

const KNOWN_TYPES: [&str; 3] = ["ping", "execute_agent", "start_collaboration"];

/// Per-connection dispatcher
pub struct SessionChannel {
    session_id: String,
    engine: AgentHandler,
}

impl SessionChannel {
    pub fn new(engine: AgentHandler) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            engine,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn connected(&self) -> OutboundEvent {
        OutboundEvent::Connected {
            session_id: self.session_id.clone(),
        }
    }

    /// Handle one inbound text frame and produce the reply event
    pub async fn handle_text(&self, text: &str) -> OutboundEvent {
        let raw: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return OutboundEvent::error(format!("Invalid message: {}", e)),
        };

        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return OutboundEvent::error(format!("Unknown message type: {}", kind));
        }

        let event: InboundEvent = match serde_json::from_value(raw) {
            Ok(event) => event,
            Err(e) => return OutboundEvent::error(format!("Invalid {} payload: {}", kind, e)),
        };

        self.dispatch(event).await
    }

    async fn dispatch(&self, event: InboundEvent) -> OutboundEvent {
        match event {
            InboundEvent::Ping => OutboundEvent::Pong,

            InboundEvent::ExecuteAgent {
                agent_id,
                message,
                context,
            } => {
                let options = context.unwrap_or_default();
                match self
                    .engine
                    .registry
                    .execute_agent(&agent_id, &message, &options)
                    .await
                {
                    Ok(execution) => OutboundEvent::AgentResponse {
                        agent: execution.agent,
                        response: execution.response,
                        usage: execution.usage,
                    },
                    Err(e) => {
                        tracing::debug!(
                            session_id = %self.session_id,
                            agent_id,
                            "execute_agent failed: {}",
                            e
                        );
                        OutboundEvent::error(e.to_string())
                    }
                }
            }

            InboundEvent::StartCollaboration {
                agent_ids,
                goal,
                iterations,
            } => {
                let iterations = iterations.unwrap_or(self.engine.default_iterations);
                match self
                    .engine
                    .coordinator
                    .collaborate(&agent_ids, &goal, iterations)
                    .await
                {
                    Ok(run) => OutboundEvent::CollaborationResult { collaboration: run },
                    Err(e) => OutboundEvent::error(e.to_string()),
                }
            }
        }
    }
}

/// GET /ws
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, SessionChannel::new(state.engine)))
}

async fn handle_ws(socket: WebSocket, channel: SessionChannel) {
    let session_id = channel.session_id().to_string();
    tracing::info!(session_id = %session_id, "WebSocket connected");

    let (ws_write, mut ws_read) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let write_handle = tokio::spawn(ws_write_loop(ws_write, rx, session_id.clone()));

    send_event(&tx, channel.connected());

    while let Some(result) = ws_read.next().await {
        let msg = match result {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(session_id = %session_id, "WebSocket read error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let reply = channel.handle_text(&text).await;
                if !send_event(&tx, reply) {
                    break;
                }
            }
            Message::Binary(_) => {
                send_event(&tx, OutboundEvent::error("Binary frames are not supported"));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    drop(tx);
    let _ = write_handle.await;
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Queue an event for the writer; false once the writer is gone
fn send_event(tx: &mpsc::UnboundedSender<Message>, event: OutboundEvent) -> bool {
    match serde_json::to_string(&event.stamped()) {
        Ok(json) => tx.send(Message::Text(json.into())).is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize outbound event: {}", e);
            true
        }
    }
}

async fn ws_write_loop(
    mut ws_write: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    session_id: String,
) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = ws_write.send(msg).await {
            tracing::warn!(session_id = %session_id, "WebSocket write error: {}", e);
            break;
        }
    }
}
