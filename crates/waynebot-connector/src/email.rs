// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email connector: posts unseen mailbox messages into a channel.
//!
//! The mailbox is reached through a [`MailSource`]. Any fetch or mark error
//! drops the session; the connector reconnects after a short pause, or a
//! longer one when the connect itself failed. Every mailbox call is raced
//! against cancellation so a stalled server cannot hold up shutdown.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use waynebot_core::{AuthorKind, Event, WaynebotError};
use waynebot_hub::Hub;
use waynebot_storage::Database;
use waynebot_storage::queries::messages;

use crate::connector::Connector;

/// Upper bound on ending a session, including on shutdown.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// One message fetched from the mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEmail {
    pub uid: u32,
    /// Display name of the sender, else the address.
    pub from: String,
    pub subject: String,
    pub body: String,
    pub date: Option<DateTime<Utc>>,
}

/// Mailbox operations the connector needs.
#[async_trait]
pub trait MailSource: Send {
    /// Open and authenticate a session.
    async fn connect(&mut self) -> Result<(), WaynebotError>;

    /// Every message not yet flagged seen.
    async fn fetch_unseen(&mut self) -> Result<Vec<InboundEmail>, WaynebotError>;

    async fn mark_seen(&mut self, uids: &[u32]) -> Result<(), WaynebotError>;

    /// End the session. Errors are ignored.
    async fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    /// Mailbox user, used in the connector name.
    pub user: String,
    /// Channel new mail is posted to.
    pub channel_id: i64,
    pub poll_every: Duration,
    /// Pause after a failed connect.
    pub connect_backoff: Duration,
    /// Pause after a session error.
    pub retry_backoff: Duration,
}

impl EmailSettings {
    pub fn new(user: impl Into<String>, channel_id: i64) -> Self {
        Self {
            user: user.into(),
            channel_id,
            poll_every: Duration::from_secs(60),
            connect_backoff: Duration::from_secs(30),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

pub struct EmailConnector {
    name: String,
    settings: EmailSettings,
    source: Mutex<Box<dyn MailSource>>,
    db: Database,
    hub: Hub,
}

impl EmailConnector {
    pub fn new(settings: EmailSettings, source: Box<dyn MailSource>, db: Database, hub: Hub) -> Self {
        Self {
            name: format!("email({})", settings.user),
            settings,
            source: Mutex::new(source),
            db,
            hub,
        }
    }

    /// Fetch, post, and mark until an error or cancellation.
    async fn poll_loop(&self, source: &mut dyn MailSource, cancel: &CancellationToken) {
        loop {
            let batch = match or_cancel(cancel, source.fetch_unseen()).await {
                None => return,
                Some(Ok(batch)) => batch,
                Some(Err(e)) => {
                    error!(name = %self.name, error = %e, "fetch unseen failed");
                    return;
                }
            };

            if !batch.is_empty() {
                self.post_all(&batch).await;
                let uids: Vec<u32> = batch.iter().map(|m| m.uid).collect();
                match or_cancel(cancel, source.mark_seen(&uids)).await {
                    None => return,
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        error!(name = %self.name, error = %e, "mark seen failed");
                        return;
                    }
                }
            }

            if !sleep_or_cancel(cancel, self.settings.poll_every).await {
                return;
            }
        }
    }

    async fn close_source(&self, source: &mut dyn MailSource) {
        if tokio::time::timeout(CLOSE_GRACE, source.close()).await.is_err() {
            warn!(name = %self.name, "mailbox close timed out");
        }
    }

    async fn post_all(&self, batch: &[InboundEmail]) {
        for email in batch {
            let created = messages::create_message(
                &self.db,
                self.settings.channel_id,
                0,
                AuthorKind::Connector,
                &email.from,
                &format_email(email),
            )
            .await;
            match created {
                Ok(msg) => {
                    debug!(name = %self.name, uid = email.uid, message_id = msg.id, "email posted");
                    self.hub.broadcast(Event::new_message(&msg));
                }
                Err(e) => error!(name = %self.name, uid = email.uid, error = %e, "failed to post email"),
            }
        }
        info!(name = %self.name, count = batch.len(), "new mail posted");
    }
}

#[async_trait]
impl Connector for EmailConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut source = self.source.lock().await;
        loop {
            match or_cancel(&cancel, source.connect()).await {
                None => {
                    self.close_source(&mut **source).await;
                    return;
                }
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    warn!(name = %self.name, error = %e, "mailbox connect failed");
                    if !sleep_or_cancel(&cancel, self.settings.connect_backoff).await {
                        return;
                    }
                    continue;
                }
            }

            self.poll_loop(&mut **source, &cancel).await;
            self.close_source(&mut **source).await;

            if cancel.is_cancelled()
                || !sleep_or_cancel(&cancel, self.settings.retry_backoff).await
            {
                return;
            }
        }
    }
}

/// Channel text for an email: bold subject, italic date, blank line, body.
pub fn format_email(email: &InboundEmail) -> String {
    let mut out = format!("**{}**\n", email.subject);
    if let Some(date) = email.date {
        out.push_str(&format!("*{}*\n", date.format("%d %b %y %H:%M UTC")));
    }
    out.push('\n');
    out.push_str(email.body.trim());
    out
}

/// Await `fut` unless cancelled first.
async fn or_cancel<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        v = fut => Some(v),
    }
}

/// Sleep for `d`. Returns false when cancelled first.
async fn sleep_or_cancel(cancel: &CancellationToken, d: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}
