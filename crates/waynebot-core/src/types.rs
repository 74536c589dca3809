// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain records shared across the Waynebot workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Who wrote a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    Human,
    Agent,
    Connector,
    ToolCall,
    ToolResult,
}

/// Observable state of a persona's actor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Thinking,
    ToolCall,
    Error,
    Stopped,
    BudgetExceeded,
    ContextFull,
}

impl AgentStatus {
    /// States a finished response must not overwrite with `idle`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentStatus::Error | AgentStatus::BudgetExceeded | AgentStatus::ContextFull
        )
    }
}

/// Closed set of broadcast event types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewMessage,
    AgentStatus,
    AgentContextBudget,
    AgentLlmCall,
    AgentToolExecution,
    NewReaction,
    RemoveReaction,
}

/// Broadcast envelope: `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, data: impl Serialize) -> Self {
        Self {
            event_type,
            data: serde_json::to_value(data).unwrap_or_default(),
        }
    }

    /// `new_message` carries the message record plus an empty reaction list.
    pub fn new_message(message: &Message) -> Self {
        let mut data = serde_json::to_value(message).unwrap_or_default();
        if let Some(obj) = data.as_object_mut() {
            obj.insert("reactions".into(), serde_json::Value::Array(Vec::new()));
        }
        Self {
            event_type: EventType::NewMessage,
            data,
        }
    }

    pub fn agent_status(persona: &Persona, channel_id: i64, status: AgentStatus) -> Self {
        Self::new(
            EventType::AgentStatus,
            serde_json::json!({
                "persona_id": persona.id,
                "persona_name": persona.name,
                "channel_id": channel_id,
                "status": status,
            }),
        )
    }
}

/// An agent identity and its sampling and budget settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: i64,
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    pub tools_enabled: Vec<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub cooldown_secs: i64,
    pub max_tokens_per_hour: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating or replacing a persona. Defaults match the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPersona {
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    pub tools_enabled: Vec<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub cooldown_secs: i64,
    pub max_tokens_per_hour: i64,
}

impl NewPersona {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }
}

impl Default for NewPersona {
    fn default() -> Self {
        Self {
            name: String::new(),
            system_prompt: String::new(),
            model: "anthropic/claude-sonnet-4-20250514".into(),
            tools_enabled: ["shell_exec", "file_read", "file_write", "http_fetch"]
                .into_iter()
                .map(String::from)
                .collect(),
            temperature: 0.7,
            max_tokens: 4096,
            cooldown_secs: 30,
            max_tokens_per_hour: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_dm: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// An append-only chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub channel_id: i64,
    pub author_id: i64,
    pub author_type: AuthorKind,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A path-bound workspace attached to zero or more channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCallRecord {
    pub id: i64,
    pub persona_id: i64,
    pub channel_id: i64,
    pub model: String,
    pub messages_json: String,
    pub response_json: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub id: i64,
    pub persona_id: i64,
    pub tool_name: String,
    pub args_json: String,
    pub output_text: String,
    pub error_text: String,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-emoji reaction tally for one message, from one viewer's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub emoji: String,
    pub count: i64,
    pub reacted: bool,
}

/// A persisted fact, decision, or preference with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub persona_id: i64,
    pub channel_id: Option<i64>,
    pub project_id: Option<i64>,
    pub kind: String,
    pub content: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub source_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    #[serde(flatten)]
    pub memory: Memory,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_message() -> Message {
        Message {
            id: 7,
            channel_id: 1,
            author_id: 3,
            author_type: AuthorKind::Human,
            author_name: "alice".into(),
            content: "hi".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn author_kind_strings() {
        assert_eq!(AuthorKind::ToolCall.to_string(), "tool_call");
        assert_eq!(AuthorKind::from_str("tool_result").unwrap(), AuthorKind::ToolResult);
        assert!(AuthorKind::from_str("robot").is_err());
    }

    #[test]
    fn status_strings_and_default() {
        assert_eq!(AgentStatus::default(), AgentStatus::Idle);
        assert_eq!(AgentStatus::BudgetExceeded.to_string(), "budget_exceeded");
        assert_eq!(
            serde_json::to_value(AgentStatus::ContextFull).unwrap(),
            serde_json::json!("context_full")
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(AgentStatus::Error.is_terminal());
        assert!(AgentStatus::ContextFull.is_terminal());
        assert!(AgentStatus::BudgetExceeded.is_terminal());
        assert!(!AgentStatus::Thinking.is_terminal());
        assert!(!AgentStatus::ToolCall.is_terminal());
    }

    #[test]
    fn event_envelope_shape() {
        let event = Event::new(EventType::AgentLlmCall, serde_json::json!({"id": 1}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "agent_llm_call");
        assert_eq!(json["data"]["id"], 1);
    }

    #[test]
    fn new_message_event_has_empty_reactions() {
        let event = Event::new_message(&sample_message());
        assert_eq!(event.event_type, EventType::NewMessage);
        assert_eq!(event.data["content"], "hi");
        assert_eq!(event.data["author_type"], "human");
        assert_eq!(event.data["reactions"], serde_json::json!([]));
    }

    #[test]
    fn new_persona_defaults_match_schema() {
        let p = NewPersona::new("helper", "be helpful");
        assert_eq!(p.model, "anthropic/claude-sonnet-4-20250514");
        assert_eq!(p.tools_enabled.len(), 4);
        assert_eq!(p.cooldown_secs, 30);
        assert_eq!(p.max_tokens_per_hour, 100_000);
    }
}
