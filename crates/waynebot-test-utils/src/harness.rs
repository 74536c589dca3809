// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness: a temp store, a running hub, and one persona subscribed to
//! one channel, plus an [`EventLog`] for asserting on broadcasts.

use std::time::Duration;

use tempfile::TempDir;
use waynebot_core::{AuthorKind, Channel, Event, EventType, Message, NewPersona, Persona, WaynebotError};
use waynebot_hub::{Hub, Subscription};
use waynebot_storage::Database;
use waynebot_storage::queries::{channels, messages, personas};

/// How long [`EventLog`] waits for an event before giving up.
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestHarness {
    pub db: Database,
    pub hub: Hub,
    pub persona: Persona,
    pub channel: Channel,
    temp_dir: TempDir,
}

impl TestHarness {
    /// Persona `bot` subscribed to channel `general`, with zero cooldown.
    pub async fn new() -> Result<Self, WaynebotError> {
        Self::with_persona(NewPersona {
            cooldown_secs: 0,
            ..NewPersona::new("bot", "You are a test assistant.")
        })
        .await
    }

    pub async fn with_persona(new: NewPersona) -> Result<Self, WaynebotError> {
        let temp_dir = TempDir::new().map_err(|e| WaynebotError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;
        let persona = personas::create_persona(&db, &new).await?;
        let channel = channels::create_channel(&db, "general", "", None).await?;
        channels::subscribe_channel(&db, persona.id, channel.id).await?;

        Ok(Self {
            db,
            hub: Hub::start(),
            persona,
            channel,
            temp_dir,
        })
    }

    /// Directory that lives as long as the harness, for sandboxes and archives.
    pub fn dir(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Post a human message to the harness channel and broadcast it.
    pub async fn post_human(&self, author: &str, content: &str) -> Result<Message, WaynebotError> {
        let msg = messages::create_message(
            &self.db,
            self.channel.id,
            1,
            AuthorKind::Human,
            author,
            content,
        )
        .await?;
        self.hub.broadcast(Event::new_message(&msg));
        Ok(msg)
    }

    /// Every message of the harness channel, oldest first.
    pub async fn messages(&self) -> Result<Vec<Message>, WaynebotError> {
        messages::get_messages_since(&self.db, self.channel.id, 0).await
    }

    pub async fn event_log(&self) -> Result<EventLog, WaynebotError> {
        Ok(EventLog {
            sub: self.hub.register().await?,
        })
    }
}

/// Hub subscriber that decodes broadcast events.
pub struct EventLog {
    sub: Subscription,
}

impl EventLog {
    /// Next event, or `None` after a timeout or when the hub stopped.
    pub async fn next(&mut self) -> Option<Event> {
        let raw = tokio::time::timeout(EVENT_TIMEOUT, self.sub.outbound.recv())
            .await
            .ok()??;
        serde_json::from_str(&raw).ok()
    }

    /// Skip events until one of `event_type` arrives.
    pub async fn next_of(&mut self, event_type: EventType) -> Option<Event> {
        loop {
            let event = self.next().await?;
            if event.event_type == event_type {
                return Some(event);
            }
        }
    }

    /// Events already queued, without waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(raw) = self.sub.outbound.try_recv() {
            if let Ok(event) = serde_json::from_str(&raw) {
                out.push(event);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_seeds_subscription() {
        let h = TestHarness::new().await.unwrap();
        let subscribed = channels::list_subscribed_channels(&h.db, h.persona.id)
            .await
            .unwrap();
        assert_eq!(subscribed.len(), 1);
        assert_eq!(subscribed[0].name, "general");
        assert_eq!(h.persona.cooldown_secs, 0);
    }

    #[tokio::test]
    async fn posted_messages_are_broadcast() {
        let h = TestHarness::new().await.unwrap();
        let mut log = h.event_log().await.unwrap();
        let msg = h.post_human("alice", "hi").await.unwrap();

        let event = log.next_of(EventType::NewMessage).await.unwrap();
        assert_eq!(event.data["id"], msg.id);
        assert_eq!(h.messages().await.unwrap().len(), 1);
        h.hub.stop().await;
    }
}
