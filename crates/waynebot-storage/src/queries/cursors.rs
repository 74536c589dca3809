// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(persona, channel) scan cursors.

use rusqlite::{OptionalExtension, params};
use waynebot_core::WaynebotError;

use crate::database::Database;

/// Last message id the persona has observed in the channel, or 0.
pub async fn get_cursor(
    db: &Database,
    persona_id: i64,
    channel_id: i64,
) -> Result<i64, WaynebotError> {
    let value = db
        .read(move |conn| {
            conn.query_row(
                "SELECT last_seen_message_id FROM actor_cursors
                 WHERE persona_id = ?1 AND channel_id = ?2",
                params![persona_id, channel_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await?;
    Ok(value.unwrap_or(0))
}

/// Upsert the cursor. A lower value never moves an existing cursor backwards.
pub async fn set_cursor(
    db: &Database,
    persona_id: i64,
    channel_id: i64,
    message_id: i64,
) -> Result<(), WaynebotError> {
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO actor_cursors (persona_id, channel_id, last_seen_message_id, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(persona_id, channel_id) DO UPDATE SET
                 last_seen_message_id = MAX(last_seen_message_id, excluded.last_seen_message_id),
                 updated_at = CURRENT_TIMESTAMP",
            params![persona_id, channel_id, message_id],
        )
    })
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::personas::create_persona;
    use tempfile::tempdir;
    use waynebot_core::NewPersona;

    #[tokio::test]
    async fn cursor_defaults_to_zero_and_never_regresses() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("c.db").to_str().unwrap())
            .await
            .unwrap();
        let p = create_persona(&db, &NewPersona::new("bot", "hi")).await.unwrap();

        assert_eq!(get_cursor(&db, p.id, 1).await.unwrap(), 0);
        set_cursor(&db, p.id, 1, 7).await.unwrap();
        assert_eq!(get_cursor(&db, p.id, 1).await.unwrap(), 7);
        set_cursor(&db, p.id, 1, 9).await.unwrap();
        assert_eq!(get_cursor(&db, p.id, 1).await.unwrap(), 9);
        set_cursor(&db, p.id, 1, 3).await.unwrap();
        assert_eq!(get_cursor(&db, p.id, 1).await.unwrap(), 9);
        assert_eq!(get_cursor(&db, p.id, 2).await.unwrap(), 0);
    }
}
