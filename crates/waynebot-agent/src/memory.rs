// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-response memory extraction.
//!
//! After a persona replies, a small model condenses the conversation into
//! facts, decisions, and preferences. Each candidate is embedded and stored
//! unless a near-identical memory already exists. Failures are logged and
//! never reach the channel.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info};
use waynebot_core::{
    AuthorKind, ChatMessage, ChatRequest, ChatResponse, EmbeddingClient, Event, EventType,
    LlmClient, Message, Persona, Project,
};
use waynebot_hub::Hub;
use waynebot_storage::queries::{activity, memories};
use waynebot_storage::{Database, NewLlmCall, NewMemory};

use crate::budget::BudgetChecker;

pub const EXTRACTION_MODEL: &str = "openai/gpt-4.1-mini";
const EXTRACTION_MAX_TOKENS: i64 = 512;

/// Conversations with fewer human messages are not worth extracting from.
pub const MIN_HUMAN_MESSAGES: usize = 3;

/// Candidates at least this similar to an existing memory are dropped.
pub const DUPLICATE_THRESHOLD: f64 = 0.9;

const EXTRACTION_PROMPT: &str = "You are a memory extraction system. Given the conversation \
below, extract key facts, decisions, and preferences that would be useful to remember for \
future conversations.

Output a JSON array of objects with \"kind\" (fact/decision/preference) and \"content\" \
(concise statement).
Only extract genuinely important information. Skip small talk and transient details.
If nothing important was discussed, return an empty array [].";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Clone)]
pub struct MemoryExtractor {
    db: Database,
    hub: Hub,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingClient>,
    budget: BudgetChecker,
}

impl MemoryExtractor {
    pub fn new(
        db: Database,
        hub: Hub,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingClient>,
    ) -> Self {
        Self {
            budget: BudgetChecker::new(db.clone()),
            db,
            hub,
            llm,
            embedder,
        }
    }

    /// Extract and store memories from `history`. Returns how many were stored.
    pub async fn extract(
        &self,
        persona: &Persona,
        channel_id: i64,
        history: &[Message],
        projects: &[Project],
    ) -> usize {
        let humans = history
            .iter()
            .filter(|m| m.author_type == AuthorKind::Human)
            .count();
        if humans < MIN_HUMAN_MESSAGES {
            return 0;
        }

        match self
            .budget
            .within_budget(persona.id, persona.max_tokens_per_hour)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(persona = %persona.name, "skipping memory extraction, budget exhausted");
                return 0;
            }
            Err(e) => {
                error!(persona = %persona.name, error = %e, "memory extraction budget check failed");
                return 0;
            }
        }

        let request = ChatRequest {
            model: EXTRACTION_MODEL.into(),
            messages: vec![
                ChatMessage::system(EXTRACTION_PROMPT),
                ChatMessage::user(format_conversation(history)),
            ],
            tools: Vec::new(),
            temperature: 0.0,
            max_tokens: EXTRACTION_MAX_TOKENS,
        };
        let messages_json = serde_json::to_string(&request.messages).unwrap_or_else(|_| "[]".into());
        let response = match self.llm.chat_completion(request).await {
            Ok(r) => r,
            Err(e) => {
                error!(persona = %persona.name, error = %e, "memory extraction call failed");
                return 0;
            }
        };
        self.record_call(persona.id, channel_id, messages_json, &response)
            .await;

        let candidates = match parse_candidates(&response.content) {
            Ok(c) => c,
            Err(e) => {
                error!(persona = %persona.name, error = %e, "unparseable memory extraction output");
                return 0;
            }
        };

        let project_id = projects.first().map(|p| p.id);
        let mut stored = 0;
        for candidate in candidates {
            if self
                .store(persona.id, channel_id, project_id, candidate)
                .await
            {
                stored += 1;
            }
        }
        if stored > 0 {
            info!(persona = %persona.name, channel_id, stored, "memories extracted");
        }
        stored
    }

    async fn store(
        &self,
        persona_id: i64,
        channel_id: i64,
        project_id: Option<i64>,
        candidate: Candidate,
    ) -> bool {
        if !memories::MEMORY_KINDS.contains(&candidate.kind.as_str())
            || candidate.content.trim().is_empty()
        {
            return false;
        }

        let embedding = match self.embedder.embed(&candidate.content).await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "failed to embed memory candidate");
                return false;
            }
        };

        match memories::search_memories(&self.db, persona_id, &embedding, None, 1).await {
            Ok(existing) => {
                if let Some(best) = existing.iter().find(|m| m.score > DUPLICATE_THRESHOLD) {
                    debug!(
                        content = %candidate.content,
                        existing = %best.memory.content,
                        score = best.score,
                        "skipping duplicate memory"
                    );
                    return false;
                }
            }
            Err(e) => {
                error!(error = %e, "duplicate memory search failed");
                return false;
            }
        }

        let created = memories::create_memory(
            &self.db,
            NewMemory {
                persona_id,
                channel_id: Some(channel_id),
                project_id,
                kind: candidate.kind,
                content: candidate.content,
                embedding,
                source_message_id: None,
            },
        )
        .await;
        match created {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "failed to store memory");
                false
            }
        }
    }

    async fn record_call(
        &self,
        persona_id: i64,
        channel_id: i64,
        messages_json: String,
        response: &ChatResponse,
    ) {
        let call = NewLlmCall {
            persona_id,
            channel_id,
            model: format!("{EXTRACTION_MODEL}#memory_extraction"),
            messages_json,
            response_json: serde_json::to_string(response).unwrap_or_else(|_| "{}".into()),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        };
        match activity::insert_llm_call(&self.db, call).await {
            Ok(record) => self
                .hub
                .broadcast(Event::new(EventType::AgentLlmCall, &record)),
            Err(e) => error!(error = %e, "failed to record memory extraction call"),
        }
    }
}

/// Human and agent turns as plain `speaker: text` lines.
pub fn format_conversation(history: &[Message]) -> String {
    let mut out = String::new();
    for m in history {
        match m.author_type {
            AuthorKind::Human => {
                out.push_str(&m.author_name);
                out.push_str(": ");
            }
            AuthorKind::Agent => out.push_str("assistant: "),
            _ => continue,
        }
        out.push_str(&m.content);
        out.push('\n');
    }
    out
}

/// Parse the model's JSON array, ignoring anything outside the outermost
/// brackets (code fences, chatter).
pub fn parse_candidates(content: &str) -> Result<Vec<Candidate>, serde_json::Error> {
    serde_json::from_str(trim_to_array(content))
}

fn trim_to_array(s: &str) -> &str {
    match (s.find('['), s.rfind(']')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => s,
    }
}
