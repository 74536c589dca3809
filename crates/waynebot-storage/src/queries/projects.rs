// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use rusqlite::params;
use waynebot_core::{Project, WaynebotError};

use crate::database::{Database, timestamp};

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        description: row.get(3)?,
        created_at: timestamp(row, 4)?,
    })
}

pub async fn create_project(
    db: &Database,
    name: &str,
    path: &str,
    description: &str,
) -> Result<Project, WaynebotError> {
    let (name, path, description) = (name.to_string(), path.to_string(), description.to_string());
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO projects (name, path, description) VALUES (?1, ?2, ?3)",
            params![name, path, description],
        )?;
        conn.query_row(
            "SELECT id, name, path, description, created_at FROM projects WHERE id = ?1",
            params![conn.last_insert_rowid()],
            row_to_project,
        )
    })
    .await
}

/// Associate a project with a channel. Idempotent.
pub async fn attach_project(
    db: &Database,
    channel_id: i64,
    project_id: i64,
) -> Result<(), WaynebotError> {
    db.write(move |conn| {
        conn.execute(
            "INSERT OR IGNORE INTO channel_projects (channel_id, project_id) VALUES (?1, ?2)",
            params![channel_id, project_id],
        )
    })
    .await?;
    Ok(())
}

pub async fn detach_project(
    db: &Database,
    channel_id: i64,
    project_id: i64,
) -> Result<(), WaynebotError> {
    db.write(move |conn| {
        conn.execute(
            "DELETE FROM channel_projects WHERE channel_id = ?1 AND project_id = ?2",
            params![channel_id, project_id],
        )
    })
    .await?;
    Ok(())
}

/// Projects attached to a channel, in project id order. The first one is the
/// channel's active project.
pub async fn list_channel_projects(
    db: &Database,
    channel_id: i64,
) -> Result<Vec<Project>, WaynebotError> {
    db.read(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.path, p.description, p.created_at
             FROM projects p
             JOIN channel_projects cp ON cp.project_id = p.id
             WHERE cp.channel_id = ?1
             ORDER BY p.id",
        )?;
        stmt.query_map(params![channel_id], row_to_project)?.collect()
    })
    .await
}
