// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `message_react`: add or remove an emoji reaction as the calling persona.

use async_trait::async_trait;
use serde::Deserialize;
use waynebot_core::{AuthorKind, Event, EventType, WaynebotError};
use waynebot_hub::Hub;
use waynebot_storage::Database;
use waynebot_storage::queries::{messages, reactions};

use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

#[derive(Deserialize)]
struct ReactArgs {
    #[serde(default)]
    message_id: i64,
    #[serde(default)]
    emoji: String,
    #[serde(default)]
    remove: bool,
}

pub struct MessageReactTool {
    db: Database,
    hub: Option<Hub>,
}

impl MessageReactTool {
    pub fn new(db: Database, hub: Option<Hub>) -> Self {
        Self { db, hub }
    }
}

#[async_trait]
impl Tool for MessageReactTool {
    fn name(&self) -> &str {
        "message_react"
    }

    fn description(&self) -> &str {
        "Add or remove an emoji reaction on a message."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message_id": {
                    "type": "integer",
                    "description": "The ID of the message to react to."
                },
                "emoji": {
                    "type": "string",
                    "description": "The emoji to react with (unicode)."
                },
                "remove": {
                    "type": "boolean",
                    "description": "If true, remove the reaction instead of adding it. Defaults to false."
                }
            },
            "required": ["message_id", "emoji"]
        })
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError> {
        let persona_id = ctx.require_persona()?;
        let args: ReactArgs = parse_args(input)?;
        if args.message_id == 0 {
            return Err(WaynebotError::Tool("message_id is required".into()));
        }
        if args.emoji.is_empty() {
            return Err(WaynebotError::Tool("emoji is required".into()));
        }

        let channel_id = messages::get_message_channel_id(&self.db, args.message_id)
            .await
            .map_err(|e| WaynebotError::Tool(format!("message not found: {e}")))?;

        let (changed, event_type, done, noop) = if args.remove {
            let removed = reactions::remove_reaction(
                &self.db,
                args.message_id,
                persona_id,
                AuthorKind::Agent,
                &args.emoji,
            )
            .await
            .map_err(|e| WaynebotError::Tool(format!("remove reaction: {e}")))?;
            (
                removed,
                EventType::RemoveReaction,
                "reaction removed",
                "no reaction to remove",
            )
        } else {
            let added = reactions::add_reaction(
                &self.db,
                args.message_id,
                persona_id,
                AuthorKind::Agent,
                &args.emoji,
            )
            .await
            .map_err(|e| WaynebotError::Tool(format!("add reaction: {e}")))?;
            (
                added,
                EventType::NewReaction,
                "reaction added",
                "already reacted",
            )
        };

        if !changed {
            return Ok(ToolOutput::ok(noop));
        }

        if let Some(hub) = &self.hub {
            let counts = reactions::reaction_counts(
                &self.db,
                args.message_id,
                persona_id,
                AuthorKind::Agent,
            )
            .await
            .unwrap_or_default();
            hub.broadcast(Event::new(
                event_type,
                serde_json::json!({
                    "message_id": args.message_id,
                    "channel_id": channel_id,
                    "emoji": args.emoji,
                    "author_id": persona_id,
                    "author_type": AuthorKind::Agent,
                    "counts": counts,
                }),
            ));
        }
        Ok(ToolOutput::ok(done))
    }
}
