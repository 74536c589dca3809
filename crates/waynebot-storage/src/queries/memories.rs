// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persona memories with embedding vectors.
//!
//! Embeddings are stored as little-endian `f32` blobs. Similarity search loads
//! the persona's memories and ranks them by cosine similarity in process.

use rusqlite::{OptionalExtension, params};
use waynebot_core::{Memory, ScoredMemory, WaynebotError};

use crate::database::{Database, timestamp};

/// Memory kinds accepted by the store.
pub const MEMORY_KINDS: [&str; 3] = ["fact", "decision", "preference"];

/// Fields of a memory to store.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub persona_id: i64,
    pub channel_id: Option<i64>,
    pub project_id: Option<i64>,
    pub kind: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub source_message_id: Option<i64>,
}

pub fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a blob written by [`vec_to_blob`]. Trailing partial floats are ignored.
pub fn blob_to_vec(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity of two vectors. Zero when lengths differ or either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

const MEMORY_COLS: &str = "id, persona_id, channel_id, project_id, kind, content, embedding, \
     source_message_id, created_at, updated_at";

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let blob: Option<Vec<u8>> = row.get(6)?;
    Ok(Memory {
        id: row.get(0)?,
        persona_id: row.get(1)?,
        channel_id: row.get(2)?,
        project_id: row.get(3)?,
        kind: row.get(4)?,
        content: row.get(5)?,
        embedding: blob.as_deref().map(blob_to_vec).unwrap_or_default(),
        source_message_id: row.get(7)?,
        created_at: timestamp(row, 8)?,
        updated_at: timestamp(row, 9)?,
    })
}

fn check_kind(kind: &str) -> Result<(), WaynebotError> {
    if MEMORY_KINDS.contains(&kind) {
        Ok(())
    } else {
        Err(WaynebotError::Validation(format!(
            "invalid memory kind {kind:?}: must be fact, decision, or preference"
        )))
    }
}

pub async fn create_memory(db: &Database, new: NewMemory) -> Result<Memory, WaynebotError> {
    check_kind(&new.kind)?;
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO memories (persona_id, channel_id, project_id, kind, content,
                                   embedding, source_message_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.persona_id,
                new.channel_id,
                new.project_id,
                new.kind,
                new.content,
                vec_to_blob(&new.embedding),
                new.source_message_id
            ],
        )?;
        conn.query_row(
            &format!("SELECT {MEMORY_COLS} FROM memories WHERE id = ?1"),
            params![conn.last_insert_rowid()],
            row_to_memory,
        )
    })
    .await
}

pub async fn get_memory(db: &Database, id: i64) -> Result<Memory, WaynebotError> {
    db.read(move |conn| {
        conn.query_row(
            &format!("SELECT {MEMORY_COLS} FROM memories WHERE id = ?1"),
            params![id],
            row_to_memory,
        )
        .optional()
    })
    .await?
    .ok_or_else(|| WaynebotError::NotFound(format!("memory {id}")))
}

/// A persona's memories, most recently updated first.
pub async fn list_memories(db: &Database, persona_id: i64) -> Result<Vec<Memory>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLS} FROM memories WHERE persona_id = ?1
             ORDER BY updated_at DESC, id DESC"
        ))?;
        stmt.query_map(params![persona_id], row_to_memory)?.collect()
    })
    .await
}

/// Rank a persona's memories against `query` and return the best `limit`.
pub async fn search_memories(
    db: &Database,
    persona_id: i64,
    query: &[f32],
    kind: Option<&str>,
    limit: usize,
) -> Result<Vec<ScoredMemory>, WaynebotError> {
    let kind = kind.map(str::to_string);
    let memories = db
        .read(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMORY_COLS} FROM memories
                 WHERE persona_id = ?1 AND embedding IS NOT NULL
                   AND (?2 IS NULL OR kind = ?2)"
            ))?;
            stmt.query_map(params![persona_id, kind], row_to_memory)?
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .await?;

    let mut scored: Vec<ScoredMemory> = memories
        .into_iter()
        .map(|memory| ScoredMemory {
            score: cosine_similarity(query, &memory.embedding),
            memory,
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    Ok(scored)
}

pub async fn update_memory(
    db: &Database,
    id: i64,
    content: &str,
    embedding: &[f32],
) -> Result<(), WaynebotError> {
    let content = content.to_string();
    let blob = vec_to_blob(embedding);
    let n = db
        .write(move |conn| {
            conn.execute(
                "UPDATE memories SET content = ?1, embedding = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?3",
                params![content, blob, id],
            )
        })
        .await?;
    if n == 0 {
        return Err(WaynebotError::NotFound(format!("memory {id}")));
    }
    Ok(())
}

pub async fn delete_memory(db: &Database, id: i64) -> Result<(), WaynebotError> {
    let n = db
        .write(move |conn| conn.execute("DELETE FROM memories WHERE id = ?1", params![id]))
        .await?;
    if n == 0 {
        return Err(WaynebotError::NotFound(format!("memory {id}")));
    }
    Ok(())
}
