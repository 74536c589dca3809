// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Users and short-lived credentials: sessions, WebSocket tickets, invites.
//!
//! Expired sessions and tickets are invisible to lookups; the cleanup loop
//! deletes them periodically.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use waynebot_core::WaynebotError;

use crate::database::{Database, format_timestamp, timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invite {
    pub id: i64,
    pub code: String,
    pub created_by: i64,
    pub used_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: timestamp(row, 3)?,
    })
}

pub async fn create_user(
    db: &Database,
    username: &str,
    password_hash: &str,
) -> Result<User, WaynebotError> {
    let username = username.to_string();
    let password_hash = password_hash.to_string();
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )?;
        conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
            params![conn.last_insert_rowid()],
            row_to_user,
        )
    })
    .await
}

pub async fn get_user_by_username(
    db: &Database,
    username: &str,
) -> Result<Option<User>, WaynebotError> {
    let username = username.to_string();
    db.read(move |conn| {
        conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            params![username],
            row_to_user,
        )
        .optional()
    })
    .await
}

pub async fn create_session(
    db: &Database,
    user_id: i64,
    ttl: Duration,
) -> Result<Session, WaynebotError> {
    let session = Session {
        token: new_token(),
        user_id,
        expires_at: Utc::now() + ttl,
    };
    let token = session.token.clone();
    let expires = format_timestamp(session.expires_at);
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, expires],
        )
    })
    .await?;
    Ok(session)
}

/// The user owning an unexpired session token.
pub async fn get_session_user(db: &Database, token: &str) -> Result<Option<i64>, WaynebotError> {
    let token = token.to_string();
    db.read(move |conn| {
        conn.query_row(
            "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        )
        .optional()
    })
    .await
}

pub async fn delete_session(db: &Database, token: &str) -> Result<(), WaynebotError> {
    let token = token.to_string();
    db.write(move |conn| conn.execute("DELETE FROM sessions WHERE token = ?1", params![token]))
        .await?;
    Ok(())
}

/// Issue a one-shot WebSocket upgrade ticket.
pub async fn create_ws_ticket(
    db: &Database,
    user_id: i64,
    ttl: Duration,
) -> Result<String, WaynebotError> {
    let ticket = new_token();
    let owned = ticket.clone();
    let expires = format_timestamp(Utc::now() + ttl);
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO ws_tickets (ticket, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![owned, user_id, expires],
        )
    })
    .await?;
    Ok(ticket)
}

/// Consume a ticket. Returns its user when the ticket existed and had not expired.
pub async fn claim_ws_ticket(db: &Database, ticket: &str) -> Result<Option<i64>, WaynebotError> {
    let ticket = ticket.to_string();
    db.write_tx(move |tx| {
        let user = tx
            .query_row(
                "SELECT user_id FROM ws_tickets WHERE ticket = ?1 AND expires_at > datetime('now')",
                params![ticket],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute("DELETE FROM ws_tickets WHERE ticket = ?1", params![ticket])?;
        Ok(user)
    })
    .await
}

pub async fn create_invite(db: &Database, created_by: i64) -> Result<Invite, WaynebotError> {
    let code = new_token();
    db.write(move |conn| {
        conn.execute(
            "INSERT INTO invites (code, created_by) VALUES (?1, ?2)",
            params![code, created_by],
        )?;
        conn.query_row(
            "SELECT id, code, created_by, used_by, created_at FROM invites WHERE id = ?1",
            params![conn.last_insert_rowid()],
            |row| {
                Ok(Invite {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    created_by: row.get(2)?,
                    used_by: row.get(3)?,
                    created_at: timestamp(row, 4)?,
                })
            },
        )
    })
    .await
}

/// Mark an unused invite as used by `user_id`.
///
/// The check and the update are one statement, so exactly one of several
/// concurrent claimers wins; the rest get `NotFound`.
pub async fn claim_invite(db: &Database, code: &str, user_id: i64) -> Result<(), WaynebotError> {
    let owned = code.to_string();
    let n = db
        .write(move |conn| {
            conn.execute(
                "UPDATE invites SET used_by = ?1 WHERE code = ?2 AND used_by IS NULL",
                params![user_id, owned],
            )
        })
        .await?;
    if n == 0 {
        return Err(WaynebotError::NotFound(format!(
            "invite {code} does not exist or was already used"
        )));
    }
    Ok(())
}

pub async fn cleanup_expired_sessions(db: &Database) -> Result<usize, WaynebotError> {
    db.write(|conn| conn.execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", []))
        .await
}

pub async fn cleanup_expired_ws_tickets(db: &Database) -> Result<usize, WaynebotError> {
    db.write(|conn| {
        conn.execute("DELETE FROM ws_tickets WHERE expires_at <= datetime('now')", [])
    })
    .await
}
