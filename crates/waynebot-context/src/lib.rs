// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context assembly for persona LLM calls.
//!
//! Builds the message list for one response in priority order:
//! - **System section**: persona prompt, project context, `AGENTS.md`, and
//!   project documents (always included, even when it overflows)
//! - **Memories**: semantically retrieved persona memories, when an embedder
//!   is configured and they fit
//! - **History**: newest-first channel messages filling whatever is left
//!
//! Every size decision uses [`waynebot_core::estimate_tokens`].

pub mod assembler;
pub mod documents;
pub mod history;

pub use assembler::{AssembleInput, AssembledContext, ContextAssembler, ContextBudget};
pub use history::to_chat_message;

/// Token window used when the caller does not supply one.
pub const DEFAULT_CONTEXT_WINDOW: usize = 200_000;
