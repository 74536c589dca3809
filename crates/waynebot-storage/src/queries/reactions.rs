// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emoji reactions on messages.

use rusqlite::params;
use waynebot_core::{AuthorKind, ReactionCount, WaynebotError};

use crate::database::Database;

/// Add a reaction. Returns `false` when the author already reacted with this emoji.
pub async fn add_reaction(
    db: &Database,
    message_id: i64,
    author_id: i64,
    author_type: AuthorKind,
    emoji: &str,
) -> Result<bool, WaynebotError> {
    let emoji = emoji.to_string();
    let n = db
        .write(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO reactions (message_id, author_id, author_type, emoji)
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id, author_id, author_type.to_string(), emoji],
            )
        })
        .await?;
    Ok(n > 0)
}

/// Remove a reaction. Returns `false` when there was nothing to remove.
pub async fn remove_reaction(
    db: &Database,
    message_id: i64,
    author_id: i64,
    author_type: AuthorKind,
    emoji: &str,
) -> Result<bool, WaynebotError> {
    let emoji = emoji.to_string();
    let n = db
        .write(move |conn| {
            conn.execute(
                "DELETE FROM reactions
                 WHERE message_id = ?1 AND author_id = ?2 AND author_type = ?3 AND emoji = ?4",
                params![message_id, author_id, author_type.to_string(), emoji],
            )
        })
        .await?;
    Ok(n > 0)
}

/// Per-emoji counts for a message, flagged with whether `viewer` reacted.
/// Ordered by first use of each emoji.
pub async fn reaction_counts(
    db: &Database,
    message_id: i64,
    viewer_id: i64,
    viewer_type: AuthorKind,
) -> Result<Vec<ReactionCount>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT emoji, COUNT(*),
                    MAX(CASE WHEN author_id = ?2 AND author_type = ?3 THEN 1 ELSE 0 END)
             FROM reactions WHERE message_id = ?1
             GROUP BY emoji
             ORDER BY MIN(id)",
        )?;
        stmt.query_map(
            params![message_id, viewer_id, viewer_type.to_string()],
            |row| {
                Ok(ReactionCount {
                    emoji: row.get(0)?,
                    count: row.get(1)?,
                    reacted: row.get::<_, i64>(2)? != 0,
                })
            },
        )?
        .collect()
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::channels::create_channel;
    use crate::queries::messages::create_message;
    use tempfile::tempdir;

    #[tokio::test]
    async fn add_remove_and_count() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("r.db").to_str().unwrap())
            .await
            .unwrap();
        let ch = create_channel(&db, "general", "", None).await.unwrap();
        let msg = create_message(&db, ch.id, 1, AuthorKind::Human, "alice", "hi")
            .await
            .unwrap();

        assert!(add_reaction(&db, msg.id, 5, AuthorKind::Agent, "👍").await.unwrap());
        assert!(!add_reaction(&db, msg.id, 5, AuthorKind::Agent, "👍").await.unwrap());
        assert!(add_reaction(&db, msg.id, 1, AuthorKind::Human, "👍").await.unwrap());
        assert!(add_reaction(&db, msg.id, 1, AuthorKind::Human, "🎉").await.unwrap());

        let counts = reaction_counts(&db, msg.id, 5, AuthorKind::Agent).await.unwrap();
        assert_eq!(
            counts,
            vec![
                ReactionCount { emoji: "👍".into(), count: 2, reacted: true },
                ReactionCount { emoji: "🎉".into(), count: 1, reacted: false },
            ]
        );

        assert!(remove_reaction(&db, msg.id, 5, AuthorKind::Agent, "👍").await.unwrap());
        assert!(!remove_reaction(&db, msg.id, 5, AuthorKind::Agent, "👍").await.unwrap());
    }
}
