// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(persona, channel) read positions of the actors.

use waynebot_core::WaynebotError;
use waynebot_storage::Database;
use waynebot_storage::queries::cursors;

#[derive(Clone)]
pub struct CursorStore {
    db: Database,
}

impl CursorStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Last message id seen, 0 when the persona never scanned the channel.
    pub async fn get(&self, persona_id: i64, channel_id: i64) -> Result<i64, WaynebotError> {
        cursors::get_cursor(&self.db, persona_id, channel_id).await
    }

    pub async fn set(
        &self,
        persona_id: i64,
        channel_id: i64,
        message_id: i64,
    ) -> Result<(), WaynebotError> {
        cursors::set_cursor(&self.db, persona_id, channel_id, message_id).await
    }
}
