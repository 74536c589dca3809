// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only activity records (LLM calls and tool executions), the rolling
//! token window, and the export/delete pair used by the archiver.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::types::ValueRef;
use rusqlite::{OptionalExtension, params};
use strum::{AsRefStr, Display, EnumIter};
use waynebot_core::{LlmCallRecord, ToolExecutionRecord, WaynebotError};

use crate::database::{Database, timestamp};

/// Fields of an LLM call to record.
#[derive(Debug, Clone, Default)]
pub struct NewLlmCall {
    pub persona_id: i64,
    pub channel_id: i64,
    pub model: String,
    pub messages_json: String,
    pub response_json: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

/// Fields of a tool invocation to record.
#[derive(Debug, Clone, Default)]
pub struct NewToolExecution {
    pub persona_id: i64,
    pub tool_name: String,
    pub args_json: String,
    pub output_text: String,
    pub error_text: String,
    pub duration_ms: i64,
}

/// The activity tables kept bounded by the archiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ActivityTable {
    LlmCalls,
    ToolExecutions,
}

const LLM_CALL_COLS: &str = "id, persona_id, channel_id, model, messages_json, response_json, \
     prompt_tokens, completion_tokens, created_at";

const TOOL_EXEC_COLS: &str = "id, persona_id, tool_name, args_json, COALESCE(output_text, ''), \
     COALESCE(error_text, ''), COALESCE(duration_ms, 0), created_at";

fn row_to_llm_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<LlmCallRecord> {
    Ok(LlmCallRecord {
        id: row.get(0)?,
        persona_id: row.get(1)?,
        channel_id: row.get(2)?,
        model: row.get(3)?,
        messages_json: row.get(4)?,
        response_json: row.get(5)?,
        prompt_tokens: row.get(6)?,
        completion_tokens: row.get(7)?,
        created_at: timestamp(row, 8)?,
    })
}

fn row_to_tool_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<ToolExecutionRecord> {
    Ok(ToolExecutionRecord {
        id: row.get(0)?,
        persona_id: row.get(1)?,
        tool_name: row.get(2)?,
        args_json: row.get(3)?,
        output_text: row.get(4)?,
        error_text: row.get(5)?,
        duration_ms: row.get(6)?,
        created_at: timestamp(row, 7)?,
    })
}

pub async fn insert_llm_call(
    db: &Database,
    call: NewLlmCall,
) -> Result<LlmCallRecord, WaynebotError> {
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO llm_calls (persona_id, channel_id, model, messages_json, response_json,
                                    prompt_tokens, completion_tokens)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                call.persona_id,
                call.channel_id,
                call.model,
                call.messages_json,
                call.response_json,
                call.prompt_tokens,
                call.completion_tokens
            ],
        )?;
        conn.query_row(
            &format!("SELECT {LLM_CALL_COLS} FROM llm_calls WHERE id = ?1"),
            params![conn.last_insert_rowid()],
            row_to_llm_call,
        )
    })
    .await
}

pub async fn insert_tool_execution(
    db: &Database,
    exec: NewToolExecution,
) -> Result<ToolExecutionRecord, WaynebotError> {
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO tool_executions (persona_id, tool_name, args_json, output_text,
                                          error_text, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                exec.persona_id,
                exec.tool_name,
                exec.args_json,
                exec.output_text,
                exec.error_text,
                exec.duration_ms
            ],
        )?;
        conn.query_row(
            &format!("SELECT {TOOL_EXEC_COLS} FROM tool_executions WHERE id = ?1"),
            params![conn.last_insert_rowid()],
            row_to_tool_execution,
        )
    })
    .await
}

/// Most recent LLM calls of a persona, newest first.
pub async fn list_llm_calls(
    db: &Database,
    persona_id: i64,
    limit: i64,
) -> Result<Vec<LlmCallRecord>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {LLM_CALL_COLS} FROM llm_calls WHERE persona_id = ?1
             ORDER BY id DESC LIMIT ?2"
        ))?;
        stmt.query_map(params![persona_id, limit], row_to_llm_call)?
            .collect()
    })
    .await
}

/// Most recent tool executions of a persona, newest first.
pub async fn list_tool_executions(
    db: &Database,
    persona_id: i64,
    limit: i64,
) -> Result<Vec<ToolExecutionRecord>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOOL_EXEC_COLS} FROM tool_executions WHERE persona_id = ?1
             ORDER BY id DESC LIMIT ?2"
        ))?;
        stmt.query_map(params![persona_id, limit], row_to_tool_execution)?
            .collect()
    })
    .await
}

/// Prompt plus completion tokens recorded for a persona in the last hour.
pub async fn tokens_used_last_hour(db: &Database, persona_id: i64) -> Result<i64, WaynebotError> {
    db.read(move |conn| {
        conn.query_row(
            "SELECT COALESCE(SUM(prompt_tokens + completion_tokens), 0) FROM llm_calls
             WHERE persona_id = ?1 AND created_at >= datetime('now', '-1 hour')",
            params![persona_id],
            |row| row.get(0),
        )
    })
    .await
}

/// Persona ids with more than `limit` rows in `table`.
pub async fn personas_over_limit(
    db: &Database,
    table: ActivityTable,
    limit: i64,
) -> Result<Vec<i64>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT persona_id FROM {table} GROUP BY persona_id HAVING COUNT(*) > ?1
             ORDER BY persona_id"
        ))?;
        stmt.query_map(params![limit], |row| row.get(0))?.collect()
    })
    .await
}

/// Id of the newest row that falls outside the newest `keep` rows, if any.
pub async fn archive_cutoff(
    db: &Database,
    table: ActivityTable,
    persona_id: i64,
    keep: i64,
) -> Result<Option<i64>, WaynebotError> {
    db.read(move |conn| {
        conn.query_row(
            &format!(
                "SELECT id FROM {table} WHERE persona_id = ?1
                 ORDER BY id DESC LIMIT 1 OFFSET ?2"
            ),
            params![persona_id, keep],
            |row| row.get(0),
        )
        .optional()
    })
    .await
}

/// One page of rows with `after_id < id <= cutoff`, each rendered as a JSON
/// object whose keys follow the table's column order.
///
/// Returns `(id, json_line)` pairs in ascending id order.
pub async fn export_rows(
    db: &Database,
    table: ActivityTable,
    persona_id: i64,
    after_id: i64,
    cutoff: i64,
    page_size: i64,
) -> Result<Vec<(i64, String)>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {table} WHERE persona_id = ?1 AND id > ?2 AND id <= ?3
             ORDER BY id ASC LIMIT ?4"
        ))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params![persona_id, after_id, cutoff, page_size])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            out.push((id, row_to_json_line(&columns, row)?));
        }
        Ok(out)
    })
    .await
}

/// Delete every row with `id <= cutoff` for the persona in one statement.
pub async fn delete_archived(
    db: &Database,
    table: ActivityTable,
    persona_id: i64,
    cutoff: i64,
) -> Result<usize, WaynebotError> {
    db.write(move |conn| {
        conn.execute(
            &format!("DELETE FROM {table} WHERE persona_id = ?1 AND id <= ?2"),
            params![persona_id, cutoff],
        )
    })
    .await
}

fn row_to_json_line(columns: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<String> {
    let mut line = String::from("{");
    for (idx, name) in columns.iter().enumerate() {
        if idx > 0 {
            line.push(',');
        }
        let value = match row.get_ref(idx)? {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Integer(i) => serde_json::Value::from(i),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => serde_json::Value::String(BASE64.encode(b)),
        };
        line.push_str(&serde_json::Value::String(name.clone()).to_string());
        line.push(':');
        line.push_str(&value.to_string());
    }
    line.push('}');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("a.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn call(persona_id: i64, prompt: i64, completion: i64) -> NewLlmCall {
        NewLlmCall {
            persona_id,
            channel_id: 1,
            model: "m".into(),
            messages_json: "[]".into(),
            response_json: "{}".into(),
            prompt_tokens: prompt,
            completion_tokens: completion,
        }
    }

    #[tokio::test]
    async fn rolling_window_ignores_old_calls() {
        let (db, _dir) = open().await;
        insert_llm_call(&db, call(1, 60, 60)).await.unwrap();
        insert_llm_call(&db, call(2, 1000, 0)).await.unwrap();
        db.write_exec(
            "INSERT INTO llm_calls (persona_id, channel_id, model, messages_json, response_json,
                                    prompt_tokens, completion_tokens, created_at)
             VALUES (1, 1, 'm', '[]', '{}', 500, 500, datetime('now', '-2 hours'))",
            vec![],
        )
        .await
        .unwrap();
        assert_eq!(tokens_used_last_hour(&db, 1).await.unwrap(), 120);
        assert_eq!(tokens_used_last_hour(&db, 3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tool_execution_round_trips_empty_error() {
        let (db, _dir) = open().await;
        let rec = insert_tool_execution(
            &db,
            NewToolExecution {
                persona_id: 1,
                tool_name: "shell_exec".into(),
                args_json: r#"{"command":"ls"}"#.into(),
                output_text: "a b c".into(),
                error_text: String::new(),
                duration_ms: 12,
            },
        )
        .await
        .unwrap();
        assert_eq!(rec.output_text, "a b c");
        assert_eq!(rec.error_text, "");
        let listed = list_tool_executions(&db, 1, 10).await.unwrap();
        assert_eq!(listed, vec![rec]);
    }

    #[tokio::test]
    async fn cutoff_export_and_delete_keep_newest() {
        let (db, _dir) = open().await;
        for i in 0..5 {
            insert_llm_call(&db, call(1, i, 0)).await.unwrap();
        }
        insert_llm_call(&db, call(2, 0, 0)).await.unwrap();

        assert_eq!(
            personas_over_limit(&db, ActivityTable::LlmCalls, 3).await.unwrap(),
            vec![1]
        );
        let cutoff = archive_cutoff(&db, ActivityTable::LlmCalls, 1, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cutoff, 2);
        assert_eq!(
            archive_cutoff(&db, ActivityTable::LlmCalls, 2, 3).await.unwrap(),
            None
        );

        let page = export_rows(&db, ActivityTable::LlmCalls, 1, 0, cutoff, 100)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].1.starts_with(r#"{"id":1,"persona_id":1,"channel_id":1,"model":"m""#));
        let parsed: serde_json::Value = serde_json::from_str(&page[1].1).unwrap();
        assert_eq!(parsed["prompt_tokens"], 1);

        let deleted = delete_archived(&db, ActivityTable::LlmCalls, 1, cutoff)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(list_llm_calls(&db, 1, 100).await.unwrap().len(), 3);
        assert_eq!(list_llm_calls(&db, 2, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_pages_by_after_id() {
        let (db, _dir) = open().await;
        for _ in 0..5 {
            insert_llm_call(&db, call(1, 1, 1)).await.unwrap();
        }
        let first = export_rows(&db, ActivityTable::LlmCalls, 1, 0, 5, 2).await.unwrap();
        let second = export_rows(&db, ActivityTable::LlmCalls, 1, first[1].0, 5, 2)
            .await
            .unwrap();
        assert_eq!(first.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second.iter().map(|r| r.0).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn table_names() {
        assert_eq!(ActivityTable::LlmCalls.to_string(), "llm_calls");
        assert_eq!(ActivityTable::ToolExecutions.as_ref(), "tool_executions");
    }
}
