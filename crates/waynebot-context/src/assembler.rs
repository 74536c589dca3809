// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The context assembler and its budget report.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;
use waynebot_core::{ChatMessage, EmbeddingClient, Message, Persona, Project, estimate_tokens};
use waynebot_storage::Database;
use waynebot_storage::queries::memories::search_memories;

use crate::DEFAULT_CONTEXT_WINDOW;
use crate::documents::{project_context_block, read_agents_md, read_project_documents};
use crate::history::{message_text, to_chat_message};

/// How many trailing history messages form the memory search query.
const MEMORY_QUERY_MESSAGES: usize = 5;
const MEMORY_SEARCH_LIMIT: usize = 10;
const MEMORY_MIN_SCORE: f64 = 0.3;

/// How the token window was spent, section by section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub total_tokens: usize,
    /// The whole system section: prompt, project block, AGENTS.md and documents.
    pub system_tokens: usize,
    pub project_tokens: usize,
    pub agentsmd_tokens: usize,
    pub document_tokens: usize,
    pub memory_tokens: usize,
    pub history_tokens: usize,
    pub history_messages: usize,
    /// History was cut short because the window ran out.
    pub exhausted: bool,
}

/// Everything needed to assemble one response's context.
#[derive(Debug, Clone, Copy)]
pub struct AssembleInput<'a> {
    pub persona: &'a Persona,
    pub channel_id: i64,
    /// Projects attached to the channel; only the first one contributes.
    pub projects: &'a [Project],
    /// Chronological, oldest first.
    pub history: &'a [Message],
    /// Zero selects [`DEFAULT_CONTEXT_WINDOW`].
    pub token_limit: usize,
}

#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub messages: Vec<ChatMessage>,
    pub budget: ContextBudget,
}

/// Builds the message list for a persona's LLM call.
#[derive(Clone)]
pub struct ContextAssembler {
    db: Database,
    embedder: Option<Arc<dyn EmbeddingClient>>,
}

impl ContextAssembler {
    /// Without an embedder, memory retrieval is skipped.
    pub fn new(db: Database, embedder: Option<Arc<dyn EmbeddingClient>>) -> Self {
        Self { db, embedder }
    }

    pub async fn assemble(&self, input: AssembleInput<'_>) -> AssembledContext {
        let total = if input.token_limit == 0 {
            DEFAULT_CONTEXT_WINDOW
        } else {
            input.token_limit
        };
        let mut budget = ContextBudget {
            total_tokens: total,
            ..ContextBudget::default()
        };

        let mut system = input.persona.system_prompt.clone();
        if let Some(project) = input.projects.first() {
            let block = project_context_block(project);
            budget.project_tokens = estimate_tokens(&block);
            system.push_str(&block);

            let dir = Path::new(&project.path);
            let agents = read_agents_md(dir).await;
            budget.agentsmd_tokens = estimate_tokens(&agents);
            system.push_str(&agents);

            let docs = read_project_documents(dir).await;
            budget.document_tokens = estimate_tokens(&docs);
            system.push_str(&docs);
        }
        budget.system_tokens = estimate_tokens(&system);

        // Signed: an oversized system section leaves negative room, so even
        // zero-token history is rejected.
        let mut remaining = total as i64 - budget.system_tokens as i64;

        let memories = self.retrieve_memories(&input).await;
        let memory_tokens = estimate_tokens(&memories);
        if !memories.is_empty() && memory_tokens as i64 <= remaining {
            budget.memory_tokens = memory_tokens;
            remaining -= memory_tokens as i64;
            system.push_str("\n\n");
            system.push_str(&memories);
        }

        let mut selected = Vec::new();
        let mut used = 0i64;
        for m in input.history.iter().rev() {
            let t = estimate_tokens(&message_text(m)) as i64;
            if used + t > remaining {
                budget.exhausted = true;
                break;
            }
            used += t;
            selected.push(to_chat_message(m));
        }
        budget.history_tokens = used as usize;
        budget.history_messages = selected.len();

        let mut messages = Vec::with_capacity(selected.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(selected.into_iter().rev());

        AssembledContext { messages, budget }
    }

    /// `## Relevant Memories` block for the recent conversation, or empty.
    /// Provider and store failures are logged and yield no memories.
    async fn retrieve_memories(&self, input: &AssembleInput<'_>) -> String {
        let Some(embedder) = &self.embedder else {
            return String::new();
        };
        if input.history.is_empty() {
            return String::new();
        }
        let start = input.history.len().saturating_sub(MEMORY_QUERY_MESSAGES);
        let query = input.history[start..]
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let vector = match embedder.embed(&query).await {
            Ok(v) => v,
            Err(e) => {
                error!(persona = %input.persona.name, error = %e, "embed memory query failed");
                return String::new();
            }
        };
        let hits = match search_memories(
            &self.db,
            input.persona.id,
            &vector,
            None,
            MEMORY_SEARCH_LIMIT,
        )
        .await
        {
            Ok(hits) => hits,
            Err(e) => {
                error!(persona = %input.persona.name, error = %e, "memory search failed");
                return String::new();
            }
        };

        let relevant: Vec<_> = hits
            .iter()
            .filter(|h| h.score >= MEMORY_MIN_SCORE)
            .collect();
        if relevant.is_empty() {
            return String::new();
        }
        let mut block = String::from("## Relevant Memories\n");
        for hit in relevant {
            block.push_str(&format!("- [{}] {}\n", hit.memory.kind, hit.memory.content));
        }
        block
    }
}
