// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry.
//!
//! The [`ToolRegistry`] is built once at startup and shared read-only by
//! every actor, so concurrent calls need no locking. Definitions handed to
//! the model follow the order of the persona's enabled list.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use waynebot_core::{ToolDefinition, WaynebotError};

/// Ambient values for one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolContext {
    /// Persona on whose behalf the tool runs.
    pub persona_id: i64,
    /// Root of the channel's first project, if any.
    pub project_dir: Option<PathBuf>,
}

impl ToolContext {
    pub fn new(persona_id: i64, project_dir: Option<PathBuf>) -> Self {
        Self {
            persona_id,
            project_dir,
        }
    }

    /// The project directory when set, else `fallback`.
    pub fn active_dir<'a>(&'a self, fallback: &'a Path) -> &'a Path {
        self.project_dir.as_deref().unwrap_or(fallback)
    }

    pub(crate) fn require_persona(&self) -> Result<i64, WaynebotError> {
        if self.persona_id == 0 {
            return Err(WaynebotError::Tool("persona_id not set in context".into()));
        }
        Ok(self.persona_id)
    }
}

/// Output from a tool invocation.
///
/// A tool may produce output and still fail, e.g. a shell command that
/// exits non-zero or an HTTP 404 whose body is still worth showing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    pub fn failed(content: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: Some(error.into()),
        }
    }
}

/// A named callable with a JSON-schema argument object and a text result.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError>;
}

/// Deserialize a tool's typed argument struct.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    input: serde_json::Value,
) -> Result<T, WaynebotError> {
    serde_json::from_value(input).map_err(|e| WaynebotError::Tool(format!("invalid args: {e}")))
}

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its `name()`. Duplicate names are rejected.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), WaynebotError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(WaynebotError::Conflict(format!(
                "tool {name:?} already registered"
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Definitions for the enabled tools that are registered, in enabled order.
    pub fn definitions_for(&self, enabled: &[String]) -> Vec<ToolDefinition> {
        enabled
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Invoke `name` with the raw JSON argument string the model produced.
    pub async fn call(
        &self,
        ctx: &ToolContext,
        name: &str,
        args_json: &str,
    ) -> Result<ToolOutput, WaynebotError> {
        let tool = self
            .get(name)
            .ok_or_else(|| WaynebotError::Tool(format!("unknown tool {name:?}")))?;
        let raw = if args_json.trim().is_empty() {
            "{}"
        } else {
            args_json
        };
        let input: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| WaynebotError::Tool(format!("invalid args: {e}")))?;
        tool.invoke(ctx, input).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
