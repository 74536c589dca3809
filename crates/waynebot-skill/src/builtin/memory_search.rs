// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `memory_search`: semantic search over the calling persona's memories.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use waynebot_core::{EmbeddingClient, ScoredMemory, WaynebotError};
use waynebot_storage::Database;
use waynebot_storage::queries::memories;

use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

const DEFAULT_LIMIT: usize = 10;

#[derive(Deserialize)]
struct SearchArgs {
    #[serde(default)]
    query: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    limit: i64,
}

pub struct MemorySearchTool {
    db: Database,
    embedder: Arc<dyn EmbeddingClient>,
}

impl MemorySearchTool {
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { db, embedder }
    }
}

/// Render search hits the way the model sees them.
pub fn format_results(results: &[ScoredMemory]) -> String {
    if results.is_empty() {
        return "No relevant memories found.".to_string();
    }
    let mut out = format!("Found {} relevant memories:\n", results.len());
    for (i, hit) in results.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. [{}] (score: {:.2}) {}\n   - {}\n",
            i + 1,
            hit.memory.kind,
            hit.score,
            hit.memory.content,
            hit.memory.created_at.format("%Y-%m-%d")
        );
    }
    out
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search your long-term memories for facts, decisions, and preferences relevant to a query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for."
                },
                "kind": {
                    "type": "string",
                    "enum": memories::MEMORY_KINDS,
                    "description": "Only return memories of this kind."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results. Defaults to 10."
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError> {
        let persona_id = ctx.require_persona()?;
        let args: SearchArgs = parse_args(input)?;
        if args.query.trim().is_empty() {
            return Err(WaynebotError::Tool("query is required".into()));
        }
        let limit = if args.limit <= 0 {
            DEFAULT_LIMIT
        } else {
            args.limit as usize
        };

        let query = self
            .embedder
            .embed(&args.query)
            .await
            .map_err(|e| WaynebotError::Tool(format!("embed query: {e}")))?;
        let kind = (!args.kind.is_empty()).then_some(args.kind.as_str());
        let results = memories::search_memories(&self.db, persona_id, &query, kind, limit)
            .await
            .map_err(|e| WaynebotError::Tool(format!("search memories: {e}")))?;

        Ok(ToolOutput::ok(format_results(&results)))
    }
}
