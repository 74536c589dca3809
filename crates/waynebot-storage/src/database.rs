// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through the writer connection's single
//! background thread. Reads are spread round-robin over a small pool of
//! read connections, each with its own thread, so they run concurrently
//! with writes and with each other under WAL. Do NOT create additional
//! Connection instances for writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio_rusqlite::Connection;
use tracing::{debug, info};
use waynebot_core::WaynebotError;

use crate::migrations;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA busy_timeout=5000;
     PRAGMA foreign_keys=ON;";

/// Read connections opened for a file-backed database.
pub const READER_POOL_SIZE: usize = 4;

/// Handle to the single local store.
///
/// Cloning is cheap: every connection is a channel handle to its
/// background thread, so clones share the same writer and readers.
#[derive(Clone)]
pub struct Database {
    writer: Connection,
    readers: Arc<[Connection]>,
    next_reader: Arc<AtomicUsize>,
    path: String,
}

impl Database {
    /// Open or create the database at `path` and apply pending migrations.
    ///
    /// Migrations run on the writer connection before the handle is returned,
    /// each in its own transaction. `":memory:"` is accepted for tests; reads
    /// then share the writer connection, since a second in-memory connection
    /// would be a different database.
    pub async fn open(path: &str) -> Result<Self, WaynebotError> {
        let writer = Connection::open(path).await.map_err(sqlite_err)?;
        apply_pragmas(&writer).await?;

        let version = writer
            .call(|conn| Ok::<_, rusqlite::Error>(migrations::run_migrations(conn)))
            .await
            .map_err(storage_err)??;

        let readers: Vec<Connection> = if path == ":memory:" {
            vec![writer.clone()]
        } else {
            let mut readers = Vec::with_capacity(READER_POOL_SIZE);
            for _ in 0..READER_POOL_SIZE {
                let reader = Connection::open(path).await.map_err(sqlite_err)?;
                apply_pragmas(&reader).await?;
                readers.push(reader);
            }
            readers
        };

        info!(path, schema_version = version, readers = readers.len(), "database ready");
        Ok(Self {
            writer,
            readers: readers.into(),
            next_reader: Arc::new(AtomicUsize::new(0)),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run a read-only closure on the next reader connection.
    pub async fn read<F, R>(&self, f: F) -> Result<R, WaynebotError>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        self.readers[idx]
            .call(move |conn| f(conn))
            .await
            .map_err(storage_err)
    }

    /// Run a closure on the writer connection. Calls are strictly serialized.
    pub async fn write<F, R>(&self, f: F) -> Result<R, WaynebotError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.writer.call(f).await.map_err(storage_err)
    }

    /// Execute a single write statement, returning the affected row count.
    pub async fn write_exec(
        &self,
        sql: &str,
        params: Vec<rusqlite::types::Value>,
    ) -> Result<usize, WaynebotError> {
        let sql = sql.to_string();
        self.write(move |conn| conn.execute(&sql, rusqlite::params_from_iter(params)))
            .await
    }

    /// Run `f` inside a transaction on the writer connection.
    ///
    /// Any error from `f` or from commit rolls the transaction back and is
    /// returned unchanged. Busy conditions surface as retryable storage
    /// errors; nothing here retries.
    pub async fn write_tx<F, R>(&self, f: F) -> Result<R, WaynebotError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.write(move |conn| {
            let tx = conn.transaction()?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
        .await
    }

    /// Highest applied migration version.
    pub async fn schema_version(&self) -> Result<i64, WaynebotError> {
        self.read(migrations::schema_version).await
    }

    /// Checkpoint the WAL. Connections close when the last clone drops.
    pub async fn close(&self) -> Result<(), WaynebotError> {
        self.write(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

async fn apply_pragmas(conn: &Connection) -> Result<(), WaynebotError> {
    conn.call(|conn| conn.execute_batch(PRAGMAS))
        .await
        .map_err(storage_err)
}

/// Convert a tokio-rusqlite error, classifying the SQLite failure.
pub(crate) fn storage_err<E: IntoWaynebot + std::fmt::Display>(e: tokio_rusqlite::Error<E>) -> WaynebotError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner.into_waynebot(),
        other => WaynebotError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Map a SQLite error to the matching error kind.
pub fn sqlite_err(e: rusqlite::Error) -> WaynebotError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => WaynebotError::NotFound("no matching row".into()),
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            WaynebotError::Conflict(e.to_string())
        }
        other => WaynebotError::Storage {
            source: Box::new(other),
        },
    }
}

/// Errors a closure run on a connection thread may return.
pub(crate) trait IntoWaynebot {
    fn into_waynebot(self) -> WaynebotError;
}

impl IntoWaynebot for rusqlite::Error {
    fn into_waynebot(self) -> WaynebotError {
        sqlite_err(self)
    }
}

impl IntoWaynebot for WaynebotError {
    fn into_waynebot(self) -> WaynebotError {
        self
    }
}

/// Parse a SQLite `DATETIME` column written by `CURRENT_TIMESTAMP` (or RFC 3339).
pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Read a timestamp column by index.
pub(crate) fn timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(idx, &raw)
}

/// Format a timestamp the way `CURRENT_TIMESTAMP` does, so string
/// comparisons against `datetime('now')` stay correct.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a text column into a strum enum.
pub(crate) fn parse_enum<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
