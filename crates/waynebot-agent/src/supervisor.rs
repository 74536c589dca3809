// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle of the actor population: one task per persona.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use waynebot_core::WaynebotError;
use waynebot_storage::queries::personas;

use crate::actor::Actor;
use crate::services::AgentServices;
use crate::status::StatusTracker;

struct ActorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Starts, stops, and restarts actors. The map lock is held across every
/// lifecycle operation, so at most one actor runs per persona.
pub struct Supervisor {
    services: AgentServices,
    scope: CancellationToken,
    actors: Mutex<HashMap<i64, ActorHandle>>,
    running: AtomicBool,
}

impl Supervisor {
    pub fn new(services: AgentServices) -> Self {
        Self {
            services,
            scope: CancellationToken::new(),
            actors: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn services(&self) -> &AgentServices {
        &self.services
    }

    pub fn status(&self) -> &StatusTracker {
        &self.services.status
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn actor_count(&self) -> usize {
        self.actors.lock().await.len()
    }

    /// Spawn an actor for every persona not already running. Returns how many
    /// were started.
    pub async fn start_all(&self) -> Result<usize, WaynebotError> {
        let all = personas::list_personas(&self.services.db).await?;
        let mut actors = self.actors.lock().await;
        let mut started = 0;
        for persona in all {
            if actors.contains_key(&persona.id) {
                continue;
            }
            let id = persona.id;
            actors.insert(id, self.spawn(Actor::new(persona, self.services.clone())));
            started += 1;
        }
        self.running.store(true, Ordering::Release);
        info!(started, total = actors.len(), "actors started");
        Ok(started)
    }

    /// Cancel every actor and wait until all have exited.
    pub async fn stop_all(&self) {
        let mut actors = self.actors.lock().await;
        for handle in actors.values() {
            handle.cancel.cancel();
        }
        for (persona_id, handle) in actors.drain() {
            if let Err(e) = handle.task.await {
                warn!(persona_id, error = %e, "actor task ended abnormally");
            }
        }
        self.running.store(false, Ordering::Release);
        info!("all actors stopped");
    }

    /// Replace the persona's actor with one built from the current stored
    /// persona. The old actor has fully exited before the new one starts.
    pub async fn restart_actor(&self, persona_id: i64) -> Result<(), WaynebotError> {
        let mut actors = self.actors.lock().await;
        if let Some(old) = actors.remove(&persona_id) {
            old.cancel.cancel();
            if let Err(e) = old.task.await {
                warn!(persona_id, error = %e, "actor task ended abnormally");
            }
        }

        let persona = personas::get_persona(&self.services.db, persona_id).await?;
        info!(persona = %persona.name, persona_id, "restarting actor");
        actors.insert(persona_id, self.spawn(Actor::new(persona, self.services.clone())));
        Ok(())
    }

    /// Stop one actor, e.g. after its persona was deleted. Returns whether
    /// one was running.
    pub async fn stop_actor(&self, persona_id: i64) -> bool {
        let Some(handle) = self.actors.lock().await.remove(&persona_id) else {
            return false;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            warn!(persona_id, error = %e, "actor task ended abnormally");
        }
        true
    }

    fn spawn(&self, actor: Actor) -> ActorHandle {
        let cancel = self.scope.child_token();
        let task = tokio::spawn(actor.run(cancel.clone()));
        ActorHandle { cancel, task }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::ActorSettings;
    use waynebot_core::{AgentStatus, NewPersona};
    use waynebot_skill::ToolRegistry;
    use waynebot_test_utils::{MockLlm, TestHarness};

    fn supervisor(h: &TestHarness) -> Supervisor {
        Supervisor::new(AgentServices::new(
            h.db.clone(),
            h.hub.clone(),
            Arc::new(MockLlm::new()),
            Arc::new(ToolRegistry::new()),
            None,
            ActorSettings::default(),
        ))
    }

    #[tokio::test]
    async fn start_all_is_idempotent() {
        let h = TestHarness::new().await.unwrap();
        personas::create_persona(&h.db, &NewPersona::new("second", ""))
            .await
            .unwrap();
        let sup = supervisor(&h);

        assert_eq!(sup.start_all().await.unwrap(), 2);
        assert_eq!(sup.start_all().await.unwrap(), 0);
        assert_eq!(sup.actor_count().await, 2);
        assert!(sup.is_running());

        sup.stop_all().await;
        assert!(!sup.is_running());
        assert_eq!(sup.actor_count().await, 0);
    }

    #[tokio::test]
    async fn stop_all_marks_every_started_persona_stopped() {
        let h = TestHarness::new().await.unwrap();
        let sup = supervisor(&h);
        sup.start_all().await.unwrap();
        sup.stop_all().await;
        assert_eq!(sup.status().get(h.persona.id), AgentStatus::Stopped);

        // Nothing running: still fine.
        sup.stop_all().await;
    }

    #[tokio::test]
    async fn restart_keeps_one_actor_per_persona() {
        let h = TestHarness::new().await.unwrap();
        let sup = supervisor(&h);
        sup.start_all().await.unwrap();

        sup.restart_actor(h.persona.id).await.unwrap();
        sup.restart_actor(h.persona.id).await.unwrap();
        assert_eq!(sup.actor_count().await, 1);

        let err = sup.restart_actor(9999).await.unwrap_err();
        assert!(matches!(err, WaynebotError::NotFound(_)));
        sup.stop_all().await;
    }

    #[tokio::test]
    async fn stop_actor_removes_only_that_persona() {
        let h = TestHarness::new().await.unwrap();
        let other = personas::create_persona(&h.db, &NewPersona::new("other", ""))
            .await
            .unwrap();
        let sup = supervisor(&h);
        sup.start_all().await.unwrap();

        assert!(sup.stop_actor(other.id).await);
        assert!(!sup.stop_actor(other.id).await);
        assert_eq!(sup.actor_count().await, 1);
        assert_eq!(sup.status().get(other.id), AgentStatus::Stopped);
        sup.stop_all().await;
    }
}
