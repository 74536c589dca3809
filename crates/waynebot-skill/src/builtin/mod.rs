// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools.
//!
//! The sandbox tools need only the [`Sandbox`]; `message_react` and
//! `memory_search` also need the store, and `memory_search` an embedder.

pub mod file;
pub mod http;
pub mod memory_search;
pub mod project_docs;
pub mod react;
pub mod shell;

pub use file::{FileReadTool, FileWriteTool};
pub use http::HttpFetchTool;
pub use memory_search::MemorySearchTool;
pub use project_docs::ProjectDocsTool;
pub use react::MessageReactTool;
pub use shell::ShellExecTool;

use std::sync::Arc;

use waynebot_core::{EmbeddingClient, WaynebotError};
use waynebot_hub::Hub;
use waynebot_storage::Database;

use crate::sandbox::Sandbox;
use crate::tool::ToolRegistry;

/// Register the filesystem, shell, HTTP and project document tools.
pub fn register_builtins(
    registry: &mut ToolRegistry,
    sandbox: Arc<Sandbox>,
) -> Result<(), WaynebotError> {
    registry.register(Arc::new(ShellExecTool::new(Arc::clone(&sandbox))))?;
    registry.register(Arc::new(FileReadTool::new(Arc::clone(&sandbox))))?;
    registry.register(Arc::new(FileWriteTool::new(Arc::clone(&sandbox))))?;
    registry.register(Arc::new(HttpFetchTool::new(Arc::clone(&sandbox))))?;
    registry.register(Arc::new(ProjectDocsTool::new(sandbox)))?;
    Ok(())
}

/// Register the tools that read or write the store. `memory_search` is
/// skipped without an embedder.
pub fn register_store_tools(
    registry: &mut ToolRegistry,
    db: Database,
    hub: Option<Hub>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
) -> Result<(), WaynebotError> {
    registry.register(Arc::new(MessageReactTool::new(db.clone(), hub)))?;
    if let Some(embedder) = embedder {
        registry.register(Arc::new(MemorySearchTool::new(db, embedder)))?;
    }
    Ok(())
}
