// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!`. Migrations run automatically on database open.

use waynebot_core::WaynebotError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection and return the
/// resulting schema version.
///
/// Refinery tracks applied migrations in its own `refinery_schema_history`
/// table and applies each pending one in its own transaction.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<i64, WaynebotError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| WaynebotError::Storage {
            source: Box::new(e),
        })?;
    schema_version(conn).map_err(crate::database::sqlite_err)
}

/// Highest applied migration version, 0 for a fresh database.
pub fn schema_version(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM refinery_schema_history",
        [],
        |row| row.get(0),
    )
}
