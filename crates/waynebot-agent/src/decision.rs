// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whether a persona should answer a batch of new channel messages.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use waynebot_core::{AuthorKind, Message, Persona};

/// Tracks the last reply time per (persona, channel) and applies the
/// mention, self-suppression, and cooldown rules.
#[derive(Debug, Default)]
pub struct DecisionMaker {
    last_reply: Mutex<HashMap<(i64, i64), Instant>>,
}

impl DecisionMaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `messages` mention the persona, or when they are not all the
    /// persona's own and the cooldown has elapsed. A mention clears the
    /// cooldown for the channel.
    pub fn should_respond(&self, persona: &Persona, channel_id: i64, messages: &[Message]) -> bool {
        if messages.is_empty() {
            return false;
        }
        if is_mentioned(&persona.name, messages) {
            self.reset(persona.id, channel_id);
            return true;
        }
        if all_from_self(persona.id, messages) {
            return false;
        }
        self.cooldown_elapsed(persona.id, channel_id, persona.cooldown_secs)
    }

    /// Start the cooldown for (persona, channel) now.
    pub fn record_response(&self, persona_id: i64, channel_id: i64) {
        self.lock().insert((persona_id, channel_id), Instant::now());
    }

    /// When the persona last replied in the channel, if it has.
    pub fn last_reply(&self, persona_id: i64, channel_id: i64) -> Option<Instant> {
        self.lock().get(&(persona_id, channel_id)).copied()
    }

    fn reset(&self, persona_id: i64, channel_id: i64) {
        self.lock().remove(&(persona_id, channel_id));
    }

    fn cooldown_elapsed(&self, persona_id: i64, channel_id: i64, cooldown_secs: i64) -> bool {
        match self.last_reply(persona_id, channel_id) {
            None => true,
            Some(at) => {
                let cooldown = Duration::from_secs(cooldown_secs.max(0) as u64);
                at.elapsed() >= cooldown
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(i64, i64), Instant>> {
        self.last_reply.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Case-insensitive `@name` anywhere in any message of the batch.
fn is_mentioned(name: &str, messages: &[Message]) -> bool {
    let mention = format!("@{}", name.to_lowercase());
    messages
        .iter()
        .any(|m| m.content.to_lowercase().contains(&mention))
}

fn all_from_self(persona_id: i64, messages: &[Message]) -> bool {
    messages
        .iter()
        .all(|m| m.author_type == AuthorKind::Agent && m.author_id == persona_id)
}
