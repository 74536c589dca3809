// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append and read operations.

use rusqlite::{OptionalExtension, params};
use waynebot_core::{AuthorKind, Message, WaynebotError};

use crate::database::{Database, parse_enum, timestamp};

const MESSAGE_COLS: &str =
    "id, channel_id, author_id, author_type, author_name, content, created_at";

pub(crate) fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let author_type: String = row.get(3)?;
    Ok(Message {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        author_id: row.get(2)?,
        author_type: parse_enum(3, &author_type)?,
        author_name: row.get(4)?,
        content: row.get(5)?,
        created_at: timestamp(row, 6)?,
    })
}

/// Append a message. The store assigns the id.
pub async fn create_message(
    db: &Database,
    channel_id: i64,
    author_id: i64,
    author_type: AuthorKind,
    author_name: &str,
    content: &str,
) -> Result<Message, WaynebotError> {
    let author_name = author_name.to_string();
    let content = content.to_string();
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO messages (channel_id, author_id, author_type, author_name, content)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                channel_id,
                author_id,
                author_type.to_string(),
                author_name,
                content
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {MESSAGE_COLS} FROM messages WHERE id = ?1"),
            params![id],
            row_to_message,
        )
    })
    .await
}

/// Messages in `channel_id` with id greater than `after_id`, oldest first.
pub async fn get_messages_since(
    db: &Database,
    channel_id: i64,
    after_id: i64,
) -> Result<Vec<Message>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLS} FROM messages
             WHERE channel_id = ?1 AND id > ?2
             ORDER BY id ASC"
        ))?;
        stmt.query_map(params![channel_id, after_id], row_to_message)?
            .collect()
    })
    .await
}

/// The newest `limit` messages of a channel, newest first.
pub async fn get_recent_messages(
    db: &Database,
    channel_id: i64,
    limit: i64,
) -> Result<Vec<Message>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLS} FROM messages
             WHERE channel_id = ?1
             ORDER BY id DESC LIMIT ?2"
        ))?;
        stmt.query_map(params![channel_id, limit], row_to_message)?
            .collect()
    })
    .await
}

pub async fn get_message(db: &Database, id: i64) -> Result<Message, WaynebotError> {
    db.read(move |conn| {
        conn.query_row(
            &format!("SELECT {MESSAGE_COLS} FROM messages WHERE id = ?1"),
            params![id],
            row_to_message,
        )
        .optional()
    })
    .await?
    .ok_or_else(|| WaynebotError::NotFound(format!("message {id}")))
}

/// Channel a message belongs to.
pub async fn get_message_channel_id(db: &Database, message_id: i64) -> Result<i64, WaynebotError> {
    db.read(move |conn| {
        conn.query_row(
            "SELECT channel_id FROM messages WHERE id = ?1",
            params![message_id],
            |row| row.get(0),
        )
        .optional()
    })
    .await?
    .ok_or_else(|| WaynebotError::NotFound(format!("message {message_id}")))
}

/// Highest message id in a channel, 0 when empty.
pub async fn latest_message_id(db: &Database, channel_id: i64) -> Result<i64, WaynebotError> {
    db.read(move |conn| {
        conn.query_row(
            "SELECT COALESCE(MAX(id), 0) FROM messages WHERE channel_id = ?1",
            params![channel_id],
            |row| row.get(0),
        )
    })
    .await
}
