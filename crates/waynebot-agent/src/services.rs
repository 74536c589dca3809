// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared dependencies handed to every actor.

use std::sync::Arc;
use std::time::Duration;

use waynebot_context::{ContextAssembler, DEFAULT_CONTEXT_WINDOW};
use waynebot_core::{EmbeddingClient, LlmClient};
use waynebot_hub::Hub;
use waynebot_skill::ToolRegistry;
use waynebot_storage::Database;

use crate::budget::BudgetChecker;
use crate::cursor::CursorStore;
use crate::decision::DecisionMaker;
use crate::memory::MemoryExtractor;
use crate::status::StatusTracker;

/// Tunables of the actor loop.
#[derive(Debug, Clone, Copy)]
pub struct ActorSettings {
    /// Scan interval when no wake signal arrives.
    pub fallback_tick: Duration,
    /// LLM rounds per response before the actor gives up.
    pub max_tool_rounds: usize,
    /// Token limit passed to the context assembler.
    pub context_window: usize,
}

impl Default for ActorSettings {
    fn default() -> Self {
        Self {
            fallback_tick: Duration::from_secs(60),
            max_tool_rounds: 10,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

/// Everything an actor needs besides its persona. Cheap to clone.
#[derive(Clone)]
pub struct AgentServices {
    pub db: Database,
    pub hub: Hub,
    pub llm: Arc<dyn LlmClient>,
    pub tools: Arc<ToolRegistry>,
    pub status: StatusTracker,
    pub decision: Arc<DecisionMaker>,
    pub budget: BudgetChecker,
    pub cursors: CursorStore,
    pub assembler: ContextAssembler,
    /// Post-response memory extraction, present only with an embedder.
    pub extractor: Option<MemoryExtractor>,
    pub settings: ActorSettings,
}

impl AgentServices {
    /// Wire the services over one store and hub. Memory retrieval and
    /// extraction are enabled when `embedder` is set.
    pub fn new(
        db: Database,
        hub: Hub,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        embedder: Option<Arc<dyn EmbeddingClient>>,
        settings: ActorSettings,
    ) -> Self {
        let extractor = embedder.clone().map(|embedder| {
            MemoryExtractor::new(db.clone(), hub.clone(), Arc::clone(&llm), embedder)
        });
        Self {
            budget: BudgetChecker::new(db.clone()),
            cursors: CursorStore::new(db.clone()),
            assembler: ContextAssembler::new(db.clone(), embedder),
            status: StatusTracker::new(),
            decision: Arc::new(DecisionMaker::new()),
            extractor,
            db,
            hub,
            llm,
            tools,
            settings,
        }
    }
}
