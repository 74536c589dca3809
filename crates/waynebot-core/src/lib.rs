// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Waynebot chat server.
//!
//! This crate provides the error type, the domain records shared between the
//! store, the hub and the agent runtime, and the consumer-side contracts for
//! the LLM and embedding providers.

pub mod error;
pub mod llm;
pub mod types;

pub use error::WaynebotError;
pub use llm::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingClient, LlmClient, ToolCall, ToolDefinition,
};
pub use types::{
    AgentStatus, AuthorKind, Channel, Event, EventType, LlmCallRecord, Memory, Message,
    NewPersona, Persona, Project, ReactionCount, ScoredMemory, ToolExecutionRecord,
};

/// Coarse token estimate used for every budgeting decision: one token per
/// four bytes of text.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}
