// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Waynebot integration tests.
//!
//! # Components
//!
//! - [`MockLlm`] - scripted chat-completion client that records requests
//! - [`MockEmbedder`] - deterministic bag-of-words embedder
//! - [`TestHarness`] - temp store, running hub, and a subscribed persona

pub mod harness;
pub mod mock_embedder;
pub mod mock_llm;

pub use harness::{EventLog, TestHarness};
pub use mock_embedder::MockEmbedder;
pub use mock_llm::MockLlm;
