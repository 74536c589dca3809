// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persona CRUD. `tools_enabled` is stored as a JSON array.

use rusqlite::{OptionalExtension, params};
use waynebot_core::{NewPersona, Persona, WaynebotError};

use crate::database::{Database, timestamp};

const PERSONA_COLS: &str = "id, name, system_prompt, model, tools_enabled, temperature, \
     max_tokens, cooldown_secs, max_tokens_per_hour, created_at";

fn row_to_persona(row: &rusqlite::Row<'_>) -> rusqlite::Result<Persona> {
    let tools_raw: String = row.get(4)?;
    let tools_enabled: Vec<String> = serde_json::from_str(&tools_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Persona {
        id: row.get(0)?,
        name: row.get(1)?,
        system_prompt: row.get(2)?,
        model: row.get(3)?,
        tools_enabled,
        temperature: row.get(5)?,
        max_tokens: row.get(6)?,
        cooldown_secs: row.get(7)?,
        max_tokens_per_hour: row.get(8)?,
        created_at: timestamp(row, 9)?,
    })
}

fn select_persona(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Persona>> {
    conn.query_row(
        &format!("SELECT {PERSONA_COLS} FROM personas WHERE id = ?1"),
        params![id],
        row_to_persona,
    )
    .optional()
}

fn tools_json(tools: &[String]) -> Result<String, WaynebotError> {
    serde_json::to_string(tools)
        .map_err(|e| WaynebotError::Internal(format!("encode tools_enabled: {e}")))
}

pub async fn create_persona(db: &Database, new: &NewPersona) -> Result<Persona, WaynebotError> {
    let tools = tools_json(&new.tools_enabled)?;
    let new = new.clone();
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO personas (name, system_prompt, model, tools_enabled, temperature,
                                   max_tokens, cooldown_secs, max_tokens_per_hour)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.name,
                new.system_prompt,
                new.model,
                tools,
                new.temperature,
                new.max_tokens,
                new.cooldown_secs,
                new.max_tokens_per_hour
            ],
        )?;
        let id = conn.last_insert_rowid();
        select_persona(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    })
    .await
}

pub async fn get_persona(db: &Database, id: i64) -> Result<Persona, WaynebotError> {
    db.read(move |conn| select_persona(conn, id))
        .await?
        .ok_or_else(|| WaynebotError::NotFound(format!("persona {id}")))
}

pub async fn list_personas(db: &Database) -> Result<Vec<Persona>, WaynebotError> {
    db.read(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {PERSONA_COLS} FROM personas ORDER BY id"))?;
        stmt.query_map([], row_to_persona)?.collect()
    })
    .await
}

/// Replace every mutable field of a persona.
pub async fn update_persona(
    db: &Database,
    id: i64,
    update: &NewPersona,
) -> Result<Persona, WaynebotError> {
    let tools = tools_json(&update.tools_enabled)?;
    let update = update.clone();
    let updated = db
        .write(move |conn| {
            let n = conn.execute(
                "UPDATE personas SET name = ?1, system_prompt = ?2, model = ?3,
                        tools_enabled = ?4, temperature = ?5, max_tokens = ?6,
                        cooldown_secs = ?7, max_tokens_per_hour = ?8
                 WHERE id = ?9",
                params![
                    update.name,
                    update.system_prompt,
                    update.model,
                    tools,
                    update.temperature,
                    update.max_tokens,
                    update.cooldown_secs,
                    update.max_tokens_per_hour,
                    id
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            select_persona(conn, id)
        })
        .await?;
    updated.ok_or_else(|| WaynebotError::NotFound(format!("persona {id}")))
}

/// Delete a persona. Subscriptions, cursors and memories cascade.
pub async fn delete_persona(db: &Database, id: i64) -> Result<(), WaynebotError> {
    let n = db
        .write(move |conn| conn.execute("DELETE FROM personas WHERE id = ?1", params![id]))
        .await?;
    if n == 0 {
        return Err(WaynebotError::NotFound(format!("persona {id}")));
    }
    Ok(())
}
