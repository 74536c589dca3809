// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Last known status of every persona's actor.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use waynebot_core::AgentStatus;

/// Shared persona → status map. Reads are frequent, writes rare.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    inner: Arc<RwLock<HashMap<i64, AgentStatus>>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status, `idle` for personas never seen.
    pub fn get(&self, persona_id: i64) -> AgentStatus {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&persona_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&self, persona_id: i64, status: AgentStatus) {
        self.inner
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(persona_id, status);
    }

    /// Snapshot of every tracked status.
    pub fn all(&self) -> HashMap<i64, AgentStatus> {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
