// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `shell_exec`: run an allowlisted command in the active directory.
//!
//! No shell is involved; `command` is executed directly with `args`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use waynebot_core::WaynebotError;

use crate::sandbox::{Sandbox, truncate_with_marker};
use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

const SHELL_TIMEOUT: Duration = Duration::from_secs(30);

/// Independent cap for stdout and for stderr.
pub const SHELL_OUTPUT_CAP: usize = 10 * 1024;

const TRUNCATED: &str = "\n... output truncated";

#[derive(Deserialize)]
struct ShellArgs {
    #[serde(default)]
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

pub struct ShellExecTool {
    sandbox: Arc<Sandbox>,
}

impl ShellExecTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command with arguments inside the sandbox."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute."
                },
                "args": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Arguments to pass to the command."
                }
            },
            "required": ["command"]
        })
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError> {
        let args: ShellArgs = parse_args(input)?;
        if args.command.is_empty() {
            return Err(WaynebotError::Tool("command is required".into()));
        }

        let base = args.command.rsplit('/').next().unwrap_or(&args.command);
        if !self.sandbox.is_command_allowed(base) {
            return Err(WaynebotError::Tool(format!("command {base:?} is not allowed")));
        }

        let dir = ctx.active_dir(&self.sandbox.base_dir);
        let child = tokio::process::Command::new(&args.command)
            .args(&args.args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(SHELL_TIMEOUT, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(WaynebotError::Tool(format!("command failed: {e}"))),
            Err(_) => {
                return Err(WaynebotError::Tool(format!(
                    "command failed: timed out after {}s",
                    SHELL_TIMEOUT.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut result = truncate_with_marker(&stdout, SHELL_OUTPUT_CAP, TRUNCATED);
        if !stderr.is_empty() {
            result.push_str("\nSTDERR:\n");
            result.push_str(&truncate_with_marker(&stderr, SHELL_OUTPUT_CAP, TRUNCATED));
        }

        if output.status.success() {
            Ok(ToolOutput::ok(result))
        } else {
            Ok(ToolOutput::failed(
                result,
                format!("command failed: {}", output.status),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tool(dir: &std::path::Path) -> ShellExecTool {
        let mut sb = Sandbox::new(dir);
        sb.allowed_commands = ["echo", "ls", "cat", "pwd"]
            .into_iter()
            .map(String::from)
            .collect();
        ShellExecTool::new(Arc::new(sb))
    }

    #[tokio::test]
    async fn runs_allowed_command_in_base_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let out = tool(dir.path())
            .invoke(&ToolContext::default(), serde_json::json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(out.error.is_none());
        assert!(out.content.contains("marker.txt"));
    }

    #[tokio::test]
    async fn project_dir_overrides_base() {
        let base = tempdir().unwrap();
        let project = tempdir().unwrap();
        std::fs::write(project.path().join("in-project.md"), "x").unwrap();
        let ctx = ToolContext::new(1, Some(project.path().to_path_buf()));
        let out = tool(base.path())
            .invoke(&ctx, serde_json::json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(out.content.contains("in-project.md"));
    }

    #[tokio::test]
    async fn disallowed_command_is_rejected_by_base_name() {
        let dir = tempdir().unwrap();
        let err = tool(dir.path())
            .invoke(
                &ToolContext::default(),
                serde_json::json!({"command": "/bin/rm", "args": ["-rf", "."]}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "command \"rm\" is not allowed");
    }

    #[tokio::test]
    async fn missing_command_is_rejected() {
        let dir = tempdir().unwrap();
        let err = tool(dir.path())
            .invoke(&ToolContext::default(), serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "command is required");
    }

    #[tokio::test]
    async fn stdout_is_capped_with_marker() {
        let dir = tempdir().unwrap();
        let big = "a".repeat(SHELL_OUTPUT_CAP + 1);
        std::fs::write(dir.path().join("big.txt"), &big).unwrap();
        let out = tool(dir.path())
            .invoke(
                &ToolContext::default(),
                serde_json::json!({"command": "cat", "args": ["big.txt"]}),
            )
            .await
            .unwrap();
        assert!(out.content.ends_with("\n... output truncated"));
        assert_eq!(out.content.len(), SHELL_OUTPUT_CAP + TRUNCATED.len());
    }

    #[tokio::test]
    async fn failing_command_keeps_stderr_and_reports_error() {
        let dir = tempdir().unwrap();
        let out = tool(dir.path())
            .invoke(
                &ToolContext::default(),
                serde_json::json!({"command": "cat", "args": ["missing.txt"]}),
            )
            .await
            .unwrap();
        assert!(out.content.contains("\nSTDERR:\n"));
        assert!(out.error.unwrap().starts_with("command failed"));
    }
}
