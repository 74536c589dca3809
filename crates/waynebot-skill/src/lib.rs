// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools that Waynebot agents can call during an LLM round.
//!
//! Every tool implements [`Tool`] and is looked up by name in a
//! [`ToolRegistry`]. File and shell tools are confined to the calling
//! persona's active directory by the rules in [`sandbox`].

pub mod builtin;
pub mod sandbox;
pub mod tool;

pub use sandbox::Sandbox;
pub use tool::{Tool, ToolContext, ToolOutput, ToolRegistry};
