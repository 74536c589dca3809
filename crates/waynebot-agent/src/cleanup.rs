// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic removal of expired sessions and WebSocket tickets.

use std::time::Duration;

use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use waynebot_core::WaynebotError;
use waynebot_storage::Database;
use waynebot_storage::queries::credentials;

pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Rows removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions: usize,
    pub ws_tickets: usize,
}

pub async fn cleanup_once(db: &Database) -> Result<CleanupReport, WaynebotError> {
    Ok(CleanupReport {
        sessions: credentials::cleanup_expired_sessions(db).await?,
        ws_tickets: credentials::cleanup_expired_ws_tickets(db).await?,
    })
}

/// Run [`cleanup_once`] every `interval` until cancelled.
pub async fn run_cleanup_loop(db: Database, interval: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match cleanup_once(&db).await {
                Ok(report) if report == CleanupReport::default() => debug!("cleanup: nothing expired"),
                Ok(report) => info!(
                    sessions = report.sessions,
                    ws_tickets = report.ws_tickets,
                    "expired credentials removed"
                ),
                Err(e) => error!(error = %e, "cleanup failed"),
            },
        }
    }
    debug!("cleanup loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use waynebot_test_utils::TestHarness;

    async fn count(db: &Database, table: &'static str) -> i64 {
        db.read(move |conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn removes_only_expired_rows() {
        let h = TestHarness::new().await.unwrap();
        let user = credentials::create_user(&h.db, "alice", "hash").await.unwrap();
        credentials::create_session(&h.db, user.id, chrono::Duration::hours(1))
            .await
            .unwrap();
        credentials::create_session(&h.db, user.id, chrono::Duration::hours(1))
            .await
            .unwrap();
        credentials::create_ws_ticket(&h.db, user.id, chrono::Duration::seconds(30))
            .await
            .unwrap();
        h.db.write_exec(
            "UPDATE sessions SET expires_at = datetime('now', '-1 minute') WHERE id = \
             (SELECT MIN(id) FROM sessions)",
            Vec::new(),
        )
        .await
        .unwrap();
        h.db.write_exec(
            "UPDATE ws_tickets SET expires_at = datetime('now', '-1 minute')",
            Vec::new(),
        )
        .await
        .unwrap();

        let report = cleanup_once(&h.db).await.unwrap();
        assert_eq!(report, CleanupReport { sessions: 1, ws_tickets: 1 });
        assert_eq!(count(&h.db, "sessions").await, 1);
        assert_eq!(count(&h.db, "ws_tickets").await, 0);

        assert_eq!(cleanup_once(&h.db).await.unwrap(), CleanupReport::default());
    }

    #[tokio::test]
    async fn loop_exits_on_cancel() {
        let h = TestHarness::new().await.unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_cleanup_loop(
            h.db.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        task.await.unwrap();
    }
}
