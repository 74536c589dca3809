// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenRouter clients for Waynebot.
//!
//! [`OpenRouterClient`] implements both [`waynebot_core::LlmClient`] (chat
//! completions with tool calling) and [`waynebot_core::EmbeddingClient`]
//! over OpenRouter's OpenAI-compatible API.

pub mod client;
pub mod types;

pub use client::{DEFAULT_BASE_URL, EMBEDDING_DIMS, EMBEDDING_MODEL, OpenRouterClient};
