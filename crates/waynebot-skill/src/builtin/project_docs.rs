// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `project_docs`: list, read, write and append markdown documents under
//! `<dir>/erd`, `<dir>/prd` and `<dir>/decisions`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use waynebot_core::WaynebotError;

use crate::sandbox::{Sandbox, secure_path};
use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

/// Document categories, in listing order.
pub const DOC_TYPES: [&str; 3] = ["erd", "prd", "decisions"];

#[derive(Deserialize)]
struct DocsArgs {
    #[serde(default)]
    action: String,
    #[serde(default)]
    doc_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    content: String,
}

pub struct ProjectDocsTool {
    sandbox: Arc<Sandbox>,
}

impl ProjectDocsTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

fn tool_err(msg: impl Into<String>) -> WaynebotError {
    WaynebotError::Tool(msg.into())
}

fn check_doc_type(doc_type: &str) -> Result<(), WaynebotError> {
    if DOC_TYPES.contains(&doc_type) {
        Ok(())
    } else {
        Err(tool_err(format!(
            "unknown doc_type {doc_type:?}: must be erd, prd, or decisions"
        )))
    }
}

fn doc_file_path(base: &Path, doc_type: &str, filename: &str) -> Result<PathBuf, WaynebotError> {
    let name = if filename.ends_with(".md") {
        filename.to_string()
    } else {
        format!("{filename}.md")
    };
    secure_path(&base.join(doc_type), &name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Names of the `.md` files directly under `dir`, sorted. Missing dir is empty.
pub async fn list_markdown_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".md") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn listing(doc_type: &str, files: &[String]) -> String {
    if files.is_empty() {
        format!("{doc_type}: (empty)")
    } else {
        format!("{doc_type}: {}", files.join(", "))
    }
}

async fn list(base: &Path, doc_type: &str) -> Result<String, WaynebotError> {
    if doc_type.is_empty() {
        let mut lines = Vec::with_capacity(DOC_TYPES.len());
        for t in DOC_TYPES {
            let files = list_markdown_files(&base.join(t)).await.unwrap_or_default();
            lines.push(listing(t, &files));
        }
        return Ok(lines.join("\n"));
    }
    check_doc_type(doc_type)?;
    let files = list_markdown_files(&base.join(doc_type))
        .await
        .map_err(|e| tool_err(format!("list {doc_type}: {e}")))?;
    Ok(listing(doc_type, &files))
}

async fn read(base: &Path, doc_type: &str, filename: &str) -> Result<String, WaynebotError> {
    check_doc_type(doc_type)?;
    if filename.is_empty() {
        return Err(tool_err("filename is required for read"));
    }
    match tokio::fs::read(doc_file_path(base, doc_type, filename)?).await {
        Ok(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(tool_err(format!(
            "document {doc_type}/{filename} does not exist"
        ))),
        Err(e) => Err(tool_err(format!("read: {e}"))),
    }
}

async fn write(
    base: &Path,
    doc_type: &str,
    filename: &str,
    content: &str,
) -> Result<String, WaynebotError> {
    check_doc_type(doc_type)?;
    if filename.is_empty() {
        return Err(tool_err("filename is required for write"));
    }
    tokio::fs::create_dir_all(base.join(doc_type))
        .await
        .map_err(|e| tool_err(format!("mkdir: {e}")))?;
    let path = doc_file_path(base, doc_type, filename)?;
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| tool_err(format!("write: {e}")))?;
    Ok(format!(
        "wrote {} bytes to {doc_type}/{}",
        content.len(),
        file_name(&path)
    ))
}

async fn append(
    base: &Path,
    doc_type: &str,
    filename: &str,
    content: &str,
) -> Result<String, WaynebotError> {
    check_doc_type(doc_type)?;
    if filename.is_empty() {
        return Err(tool_err("filename is required for append"));
    }
    if content.trim().is_empty() {
        return Err(tool_err("content is required for append"));
    }
    tokio::fs::create_dir_all(base.join(doc_type))
        .await
        .map_err(|e| tool_err(format!("mkdir: {e}")))?;

    let entry = format!(
        "\n## {}\n\n{content}\n",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    let path = doc_file_path(base, doc_type, filename)?;
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .await
        .map_err(|e| tool_err(format!("open: {e}")))?;
    file.write_all(entry.as_bytes())
        .await
        .map_err(|e| tool_err(format!("append: {e}")))?;
    file.flush()
        .await
        .map_err(|e| tool_err(format!("append: {e}")))?;
    Ok(format!("appended entry to {doc_type}/{}", file_name(&path)))
}

#[async_trait]
impl Tool for ProjectDocsTool {
    fn name(&self) -> &str {
        "project_docs"
    }

    fn description(&self) -> &str {
        "Read, write, or list project documents (erd/, prd/, decisions/ directories). \
         Use action=list to see which docs exist, action=read to read a doc, \
         action=write to create/update erd or prd, action=append to add a timestamped \
         entry to the decisions log."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["read", "write", "append", "list"],
                    "description": "The action to perform."
                },
                "doc_type": {
                    "type": "string",
                    "enum": DOC_TYPES,
                    "description": "The document type (required for read, write, append)."
                },
                "filename": {
                    "type": "string",
                    "description": "Document file name; .md is added when missing (required for read, write, append)."
                },
                "content": {
                    "type": "string",
                    "description": "Content to write or append (required for write and append)."
                }
            },
            "required": ["action"]
        })
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError> {
        let args: DocsArgs = parse_args(input)?;
        let base = ctx.active_dir(&self.sandbox.base_dir);

        let content = match args.action.as_str() {
            "list" => list(base, &args.doc_type).await?,
            "read" => read(base, &args.doc_type, &args.filename).await?,
            "write" => write(base, &args.doc_type, &args.filename, &args.content).await?,
            "append" => append(base, &args.doc_type, &args.filename, &args.content).await?,
            other => {
                return Err(tool_err(format!(
                    "unknown action {other:?}: must be list, read, write, or append"
                )));
            }
        };
        Ok(ToolOutput::ok(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn run(dir: &Path, args: serde_json::Value) -> Result<String, WaynebotError> {
        let tool = ProjectDocsTool::new(Arc::new(Sandbox::new("/nonexistent")));
        let ctx = ToolContext::new(1, Some(dir.to_path_buf()));
        tool.invoke(&ctx, args).await.map(|o| o.content)
    }

    #[tokio::test]
    async fn list_all_when_empty() {
        let dir = tempdir().unwrap();
        let out = run(dir.path(), serde_json::json!({"action": "list"}))
            .await
            .unwrap();
        assert_eq!(out, "erd: (empty)\nprd: (empty)\ndecisions: (empty)");
    }

    #[tokio::test]
    async fn write_read_and_list() {
        let dir = tempdir().unwrap();
        let out = run(
            dir.path(),
            serde_json::json!({"action": "write", "doc_type": "erd", "filename": "schema", "content": "users"}),
        )
        .await
        .unwrap();
        assert_eq!(out, "wrote 5 bytes to erd/schema.md");

        let out = run(
            dir.path(),
            serde_json::json!({"action": "read", "doc_type": "erd", "filename": "schema.md"}),
        )
        .await
        .unwrap();
        assert_eq!(out, "users");

        let out = run(dir.path(), serde_json::json!({"action": "list", "doc_type": "erd"}))
            .await
            .unwrap();
        assert_eq!(out, "erd: schema.md");
    }

    #[tokio::test]
    async fn append_adds_timestamped_entries() {
        let dir = tempdir().unwrap();
        for content in ["use sqlite", "use axum"] {
            let out = run(
                dir.path(),
                serde_json::json!({"action": "append", "doc_type": "decisions", "filename": "log", "content": content}),
            )
            .await
            .unwrap();
            assert_eq!(out, "appended entry to decisions/log.md");
        }
        let text = std::fs::read_to_string(dir.path().join("decisions/log.md")).unwrap();
        assert_eq!(text.matches("\n## ").count(), 2);
        assert!(text.ends_with("\n\nuse axum\n"));
    }

    #[tokio::test]
    async fn validation_errors() {
        let dir = tempdir().unwrap();
        let err = run(
            dir.path(),
            serde_json::json!({"action": "read", "doc_type": "notes", "filename": "x"}),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown doc_type \"notes\": must be erd, prd, or decisions"
        );

        let err = run(dir.path(), serde_json::json!({"action": "read", "doc_type": "prd"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "filename is required for read");

        let err = run(dir.path(), serde_json::json!({"action": "delete"}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("unknown action \"delete\""));

        let err = run(
            dir.path(),
            serde_json::json!({"action": "read", "doc_type": "prd", "filename": "missing"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "document prd/missing does not exist");

        let err = run(
            dir.path(),
            serde_json::json!({"action": "write", "doc_type": "prd", "filename": "../../x", "content": "x"}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("escapes sandbox"));
    }
}
