// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channels, persona subscriptions, and direct-message channels.

use rusqlite::{OptionalExtension, params};
use waynebot_core::{Channel, WaynebotError};

use crate::database::{Database, timestamp};

const CHANNEL_COLS: &str = "c.id, c.name, c.description, c.is_dm, c.created_by, c.created_at";

fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_dm: row.get(3)?,
        created_by: row.get(4)?,
        created_at: timestamp(row, 5)?,
    })
}

fn select_channel(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Channel> {
    conn.query_row(
        &format!("SELECT {CHANNEL_COLS} FROM channels c WHERE c.id = ?1"),
        params![id],
        row_to_channel,
    )
}

pub async fn create_channel(
    db: &Database,
    name: &str,
    description: &str,
    created_by: Option<i64>,
) -> Result<Channel, WaynebotError> {
    let name = name.to_string();
    let description = description.to_string();
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO channels (name, description, created_by) VALUES (?1, ?2, ?3)",
            params![name, description, created_by],
        )?;
        select_channel(conn, conn.last_insert_rowid())
    })
    .await
}

pub async fn get_channel(db: &Database, id: i64) -> Result<Channel, WaynebotError> {
    db.read(move |conn| select_channel(conn, id).optional())
        .await?
        .ok_or_else(|| WaynebotError::NotFound(format!("channel {id}")))
}

pub async fn get_channel_by_name(
    db: &Database,
    name: &str,
) -> Result<Option<Channel>, WaynebotError> {
    let name = name.to_string();
    db.read(move |conn| {
        conn.query_row(
            &format!("SELECT {CHANNEL_COLS} FROM channels c WHERE c.name = ?1"),
            params![name],
            row_to_channel,
        )
        .optional()
    })
    .await
}

/// Look a channel up by name, creating it when absent.
pub async fn ensure_channel(db: &Database, name: &str) -> Result<Channel, WaynebotError> {
    if let Some(ch) = get_channel_by_name(db, name).await? {
        return Ok(ch);
    }
    let owned = name.to_string();
    db.write(move |conn| {
        conn.execute(
            "INSERT OR IGNORE INTO channels (name) VALUES (?1)",
            params![owned],
        )?;
        conn.query_row(
            &format!("SELECT {CHANNEL_COLS} FROM channels c WHERE c.name = ?1"),
            params![owned],
            row_to_channel,
        )
    })
    .await
}

pub async fn list_channels(db: &Database) -> Result<Vec<Channel>, WaynebotError> {
    db.read(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHANNEL_COLS} FROM channels c ORDER BY c.id"
        ))?;
        stmt.query_map([], row_to_channel)?.collect()
    })
    .await
}

pub async fn delete_channel(db: &Database, id: i64) -> Result<(), WaynebotError> {
    let n = db
        .write(move |conn| conn.execute("DELETE FROM channels WHERE id = ?1", params![id]))
        .await?;
    if n == 0 {
        return Err(WaynebotError::NotFound(format!("channel {id}")));
    }
    Ok(())
}

/// Subscribe a persona to a channel. Idempotent.
pub async fn subscribe_channel(
    db: &Database,
    persona_id: i64,
    channel_id: i64,
) -> Result<(), WaynebotError> {
    db.write(move |conn| {
        conn.execute(
            "INSERT OR IGNORE INTO persona_channels (persona_id, channel_id) VALUES (?1, ?2)",
            params![persona_id, channel_id],
        )
    })
    .await?;
    Ok(())
}

pub async fn unsubscribe_channel(
    db: &Database,
    persona_id: i64,
    channel_id: i64,
) -> Result<(), WaynebotError> {
    db.write(move |conn| {
        conn.execute(
            "DELETE FROM persona_channels WHERE persona_id = ?1 AND channel_id = ?2",
            params![persona_id, channel_id],
        )
    })
    .await?;
    Ok(())
}

/// Channels a persona observes, ordered by channel id.
pub async fn list_subscribed_channels(
    db: &Database,
    persona_id: i64,
) -> Result<Vec<Channel>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHANNEL_COLS} FROM channels c
             JOIN persona_channels pc ON pc.channel_id = c.id
             WHERE pc.persona_id = ?1
             ORDER BY c.id"
        ))?;
        stmt.query_map(params![persona_id], row_to_channel)?.collect()
    })
    .await
}

/// The other side of a direct-message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmPeer {
    User(i64),
    Persona(i64),
}

/// Create a DM channel between `user_id` and `peer`, or return the existing one.
///
/// Channel creation and participant rows are written in one transaction.
pub async fn get_or_create_dm(
    db: &Database,
    user_id: i64,
    peer: DmPeer,
) -> Result<Channel, WaynebotError> {
    db.write_tx(move |tx| {
        let (peer_user, peer_persona, name) = match peer {
            DmPeer::User(other) => {
                let (lo, hi) = if user_id <= other {
                    (user_id, other)
                } else {
                    (other, user_id)
                };
                (Some(other), None, format!("dm-u{lo}-u{hi}"))
            }
            DmPeer::Persona(pid) => (None, Some(pid), format!("dm-u{user_id}-p{pid}")),
        };

        let existing = tx
            .query_row(
                &format!("SELECT {CHANNEL_COLS} FROM channels c WHERE c.name = ?1 AND c.is_dm = 1"),
                params![name],
                row_to_channel,
            )
            .optional()?;
        if let Some(ch) = existing {
            return Ok(ch);
        }

        tx.execute(
            "INSERT INTO channels (name, is_dm, created_by) VALUES (?1, 1, ?2)",
            params![name, user_id],
        )?;
        let channel_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO dm_participants (channel_id, user_id, persona_id) VALUES (?1, ?2, NULL)",
            params![channel_id, user_id],
        )?;
        tx.execute(
            "INSERT INTO dm_participants (channel_id, user_id, persona_id) VALUES (?1, ?2, ?3)",
            params![channel_id, peer_user, peer_persona],
        )?;
        if let Some(pid) = peer_persona {
            tx.execute(
                "INSERT OR IGNORE INTO persona_channels (persona_id, channel_id) VALUES (?1, ?2)",
                params![pid, channel_id],
            )?;
        }
        select_channel(tx, channel_id)
    })
    .await
}
