// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `file_read` and `file_write`, confined to the active directory.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use waynebot_core::WaynebotError;

use crate::sandbox::{Sandbox, secure_path};
use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

/// Largest file `file_read` returns and largest content `file_write` accepts.
pub const MAX_FILE_SIZE: u64 = 1 << 20;

#[derive(Deserialize)]
struct ReadArgs {
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    #[serde(default)]
    path: String,
    #[serde(default)]
    content: String,
}

pub struct FileReadTool {
    sandbox: Arc<Sandbox>,
}

impl FileReadTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file inside the sandbox."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to the file to read."
                }
            },
            "required": ["path"]
        })
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError> {
        let args: ReadArgs = parse_args(input)?;
        if args.path.is_empty() {
            return Err(WaynebotError::Tool("path is required".into()));
        }
        let resolved = secure_path(ctx.active_dir(&self.sandbox.base_dir), &args.path)?;

        let meta = tokio::fs::metadata(&resolved)
            .await
            .map_err(|e| WaynebotError::Tool(format!("stat: {e}")))?;
        if meta.is_dir() {
            return Err(WaynebotError::Tool("path is a directory".into()));
        }
        if meta.len() > MAX_FILE_SIZE {
            return Err(WaynebotError::Tool(format!(
                "file too large: {} bytes (max {MAX_FILE_SIZE})",
                meta.len()
            )));
        }

        let data = tokio::fs::read(&resolved)
            .await
            .map_err(|e| WaynebotError::Tool(format!("read: {e}")))?;
        Ok(ToolOutput::ok(String::from_utf8_lossy(&data)))
    }
}

pub struct FileWriteTool {
    sandbox: Arc<Sandbox>,
}

impl FileWriteTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file inside the sandbox."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to the file to write."
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file."
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError> {
        let args: WriteArgs = parse_args(input)?;
        if args.path.is_empty() {
            return Err(WaynebotError::Tool("path is required".into()));
        }
        if args.content.len() as u64 > MAX_FILE_SIZE {
            return Err(WaynebotError::Tool(format!(
                "content too large: {} bytes (max {MAX_FILE_SIZE})",
                args.content.len()
            )));
        }
        let resolved = secure_path(ctx.active_dir(&self.sandbox.base_dir), &args.path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WaynebotError::Tool(format!("mkdir: {e}")))?;
        }
        tokio::fs::write(&resolved, args.content.as_bytes())
            .await
            .map_err(|e| WaynebotError::Tool(format!("write: {e}")))?;

        Ok(ToolOutput::ok(format!(
            "wrote {} bytes to {}",
            args.content.len(),
            args.path
        )))
    }
}
