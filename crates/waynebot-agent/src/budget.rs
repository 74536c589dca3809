// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling hourly token allowance per persona.

use waynebot_core::WaynebotError;
use waynebot_storage::Database;
use waynebot_storage::queries::activity::tokens_used_last_hour;

/// Stateless: every check sums the persona's LLM call records of the last hour.
#[derive(Clone)]
pub struct BudgetChecker {
    db: Database,
}

impl BudgetChecker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// True while usage is strictly below `max_tokens_per_hour`. A limit of
    /// zero or less means unlimited.
    pub async fn within_budget(
        &self,
        persona_id: i64,
        max_tokens_per_hour: i64,
    ) -> Result<bool, WaynebotError> {
        if max_tokens_per_hour <= 0 {
            return Ok(true);
        }
        let used = tokens_used_last_hour(&self.db, persona_id).await?;
        Ok(used < max_tokens_per_hour)
    }
}
