// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-persona actor task.
//!
//! An actor sleeps until the hub signals activity or its fallback timer
//! fires, then scans every subscribed channel for messages past its cursor.
//! The cursor always advances past a scanned batch, whether or not the
//! persona replied, so a batch is never considered twice.

use std::path::PathBuf;
use std::time::Instant as StdInstant;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use waynebot_context::{AssembleInput, ContextBudget};
use waynebot_core::{
    AgentStatus, AuthorKind, ChatMessage, ChatRequest, ChatResponse, Event, EventType, Message,
    Persona, Project, ToolCall, WaynebotError,
};
use waynebot_hub::WakeReceiver;
use waynebot_skill::{ToolContext, ToolOutput};
use waynebot_storage::queries::{activity, channels, messages, projects};
use waynebot_storage::{NewLlmCall, NewToolExecution};

use crate::services::AgentServices;

/// Messages of channel history handed to the context assembler.
pub const HISTORY_LIMIT: i64 = 50;

/// Posted when the system prompt and project documents leave no room for
/// any conversation.
pub const CONTEXT_FULL_MESSAGE: &str = "My context window is full: the system prompt and project \
     documents leave no room for this conversation. Reset my context for this channel to continue.";

/// How a response attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// A final answer was produced (possibly empty).
    Replied,
    /// Aborted by an error, a full context, the round limit, or cancellation.
    Abandoned,
}

pub struct Actor {
    persona: Persona,
    services: AgentServices,
    wake: WakeReceiver,
}

impl Actor {
    /// Subscribes to the hub's wake signal immediately, so activity between
    /// construction and the first poll is not missed.
    pub fn new(persona: Persona, services: AgentServices) -> Self {
        let wake = services.hub.wake_receiver();
        Self {
            persona,
            services,
            wake,
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Run until `cancel` fires. Leaves the persona's status at `stopped`.
    pub async fn run(mut self, cancel: CancellationToken) {
        let tick = self.services.settings.fallback_tick;
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut wake_open = true;

        self.services.status.set(self.persona.id, AgentStatus::Idle);
        info!(persona = %self.persona.name, "actor started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = self.wake.changed(), if wake_open => {
                    if changed.is_err() {
                        debug!(persona = %self.persona.name, "wake channel closed, polling on timer only");
                        wake_open = false;
                        continue;
                    }
                    self.process_channels(&cancel).await;
                }
                _ = ticker.tick() => self.process_channels(&cancel).await,
            }
        }

        self.services.status.set(self.persona.id, AgentStatus::Stopped);
        info!(persona = %self.persona.name, "actor stopped");
    }

    /// Scan every subscribed channel once.
    pub async fn process_channels(&self, cancel: &CancellationToken) {
        let subscribed =
            match channels::list_subscribed_channels(&self.services.db, self.persona.id).await {
                Ok(list) => list,
                Err(e) => {
                    error!(persona = %self.persona.name, error = %e, "failed to list subscribed channels");
                    return;
                }
            };

        for channel in subscribed {
            if cancel.is_cancelled() {
                return;
            }
            self.process_channel(channel.id, cancel).await;
        }
    }

    async fn process_channel(&self, channel_id: i64, cancel: &CancellationToken) {
        let svc = &self.services;
        let cursor = match svc.cursors.get(self.persona.id, channel_id).await {
            Ok(c) => c,
            Err(e) => {
                error!(persona = %self.persona.name, channel_id, error = %e, "failed to read cursor");
                return;
            }
        };

        let batch = match messages::get_messages_since(&svc.db, channel_id, cursor).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(persona = %self.persona.name, channel_id, cursor, error = %e, "failed to read new messages");
                return;
            }
        };
        let Some(last_id) = batch.last().map(|m| m.id) else {
            return;
        };

        self.handle_batch(channel_id, &batch, cancel).await;

        if let Err(e) = svc.cursors.set(self.persona.id, channel_id, last_id).await {
            error!(persona = %self.persona.name, channel_id, error = %e, "failed to advance cursor");
        }
    }

    async fn handle_batch(&self, channel_id: i64, batch: &[Message], cancel: &CancellationToken) {
        let svc = &self.services;
        if !svc.decision.should_respond(&self.persona, channel_id, batch) {
            return;
        }

        match svc
            .budget
            .within_budget(self.persona.id, self.persona.max_tokens_per_hour)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(persona = %self.persona.name, channel_id, "hourly token budget exhausted");
                self.set_status(channel_id, AgentStatus::BudgetExceeded);
                return;
            }
            Err(e) => {
                error!(persona = %self.persona.name, error = %e, "budget check failed");
                return;
            }
        }

        self.respond(channel_id, cancel).await;
    }

    async fn respond(&self, channel_id: i64, cancel: &CancellationToken) {
        self.set_status(channel_id, AgentStatus::Thinking);

        let prepared = self.prepare(channel_id).await;
        let outcome = match &prepared {
            Ok((history, projects)) => {
                self.run_tool_loop(channel_id, history, projects, cancel)
                    .await
            }
            Err(e) => {
                error!(persona = %self.persona.name, channel_id, error = %e, "failed to load conversation");
                self.set_status(channel_id, AgentStatus::Error);
                Outcome::Abandoned
            }
        };

        let status = self.services.status.get(self.persona.id);
        if matches!(status, AgentStatus::Thinking | AgentStatus::ToolCall) {
            self.set_status(channel_id, AgentStatus::Idle);
        }

        if outcome != Outcome::Replied {
            return;
        }
        if let (Some(extractor), Ok((history, projects))) = (&self.services.extractor, &prepared) {
            extractor
                .extract(&self.persona, channel_id, history, projects)
                .await;
        }
    }

    /// Chronological recent history and the channel's projects.
    async fn prepare(&self, channel_id: i64) -> Result<(Vec<Message>, Vec<Project>), WaynebotError> {
        let db = &self.services.db;
        let mut history = messages::get_recent_messages(db, channel_id, HISTORY_LIMIT).await?;
        history.reverse();
        let projects = projects::list_channel_projects(db, channel_id).await?;
        Ok((history, projects))
    }

    async fn run_tool_loop(
        &self,
        channel_id: i64,
        history: &[Message],
        projects: &[Project],
        cancel: &CancellationToken,
    ) -> Outcome {
        let svc = &self.services;
        let assembled = svc
            .assembler
            .assemble(AssembleInput {
                persona: &self.persona,
                channel_id,
                projects,
                history,
                token_limit: svc.settings.context_window,
            })
            .await;
        let budget = assembled.budget;

        if budget.exhausted && budget.history_messages == 0 {
            warn!(persona = %self.persona.name, channel_id, "context window full");
            self.set_status(channel_id, AgentStatus::ContextFull);
            self.post_message(channel_id, CONTEXT_FULL_MESSAGE).await;
            self.broadcast_budget(channel_id, &budget);
            return Outcome::Abandoned;
        }

        let tools = svc.tools.definitions_for(&self.persona.tools_enabled);
        let project_dir = projects.first().map(|p| PathBuf::from(&p.path));
        let mut conversation = assembled.messages;

        for round in 0..svc.settings.max_tool_rounds {
            if cancel.is_cancelled() {
                return Outcome::Abandoned;
            }

            let request = ChatRequest {
                model: self.persona.model.clone(),
                messages: conversation.clone(),
                tools: tools.clone(),
                temperature: self.persona.temperature,
                max_tokens: self.persona.max_tokens,
            };
            let response = match svc.llm.chat_completion(request).await {
                Ok(r) => r,
                Err(e) => {
                    error!(persona = %self.persona.name, channel_id, round, error = %e, "LLM call failed");
                    self.set_status(channel_id, AgentStatus::Error);
                    return Outcome::Abandoned;
                }
            };

            self.record_llm_call(channel_id, &conversation, &response)
                .await;

            if response.tool_calls.is_empty() {
                if !response.content.is_empty() {
                    self.post_message(channel_id, &response.content).await;
                }
                svc.decision.record_response(self.persona.id, channel_id);
                self.broadcast_budget(channel_id, &budget);
                return Outcome::Replied;
            }

            self.set_status(channel_id, AgentStatus::ToolCall);
            conversation.push(ChatMessage::assistant_tool_calls(
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let result = self.execute_tool(call, project_dir.clone()).await;
                conversation.push(ChatMessage::tool(call.id.clone(), result));
            }
        }

        warn!(
            persona = %self.persona.name,
            channel_id,
            rounds = svc.settings.max_tool_rounds,
            "tool round limit reached, abandoning response"
        );
        Outcome::Abandoned
    }

    /// Run one tool call to completion and return the text shown to the model.
    ///
    /// The call is not tied to the actor's cancellation so its result is
    /// always recorded.
    async fn execute_tool(&self, call: &ToolCall, project_dir: Option<PathBuf>) -> String {
        let svc = &self.services;
        let ctx = ToolContext::new(self.persona.id, project_dir);
        let started = StdInstant::now();
        let result = svc.tools.call(&ctx, &call.name, &call.arguments).await;
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let (output_text, error_text) = match &result {
            Ok(ToolOutput { content, error }) => (content.clone(), error.clone().unwrap_or_default()),
            Err(e) => (String::new(), e.to_string()),
        };
        debug!(
            persona = %self.persona.name,
            tool = %call.name,
            duration_ms,
            failed = !error_text.is_empty(),
            "tool executed"
        );

        let record = activity::insert_tool_execution(
            &svc.db,
            NewToolExecution {
                persona_id: self.persona.id,
                tool_name: call.name.clone(),
                args_json: call.arguments.clone(),
                output_text: output_text.clone(),
                error_text: error_text.clone(),
                duration_ms,
            },
        )
        .await;
        match record {
            Ok(record) => svc
                .hub
                .broadcast(Event::new(EventType::AgentToolExecution, &record)),
            Err(e) => error!(persona = %self.persona.name, tool = %call.name, error = %e, "failed to record tool execution"),
        }

        render_tool_result(&output_text, &error_text)
    }

    async fn record_llm_call(
        &self,
        channel_id: i64,
        conversation: &[ChatMessage],
        response: &ChatResponse,
    ) {
        let call = NewLlmCall {
            persona_id: self.persona.id,
            channel_id,
            model: self.persona.model.clone(),
            messages_json: serde_json::to_string(conversation).unwrap_or_else(|_| "[]".into()),
            response_json: serde_json::to_string(response).unwrap_or_else(|_| "{}".into()),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        };
        match activity::insert_llm_call(&self.services.db, call).await {
            Ok(record) => self
                .services
                .hub
                .broadcast(Event::new(EventType::AgentLlmCall, &record)),
            Err(e) => {
                error!(persona = %self.persona.name, channel_id, error = %e, "failed to record LLM call")
            }
        }
    }

    async fn post_message(&self, channel_id: i64, content: &str) {
        let created = messages::create_message(
            &self.services.db,
            channel_id,
            self.persona.id,
            AuthorKind::Agent,
            &self.persona.name,
            content,
        )
        .await;
        match created {
            Ok(msg) => self.services.hub.broadcast(Event::new_message(&msg)),
            Err(e) => {
                error!(persona = %self.persona.name, channel_id, error = %e, "failed to post message")
            }
        }
    }

    fn set_status(&self, channel_id: i64, status: AgentStatus) {
        self.services.status.set(self.persona.id, status);
        self.services
            .hub
            .broadcast(Event::agent_status(&self.persona, channel_id, status));
    }

    fn broadcast_budget(&self, channel_id: i64, budget: &ContextBudget) {
        self.services
            .hub
            .broadcast(budget_event(self.persona.id, channel_id, budget));
    }
}

/// `agent_context_budget` event: the budget fields plus persona and channel.
pub fn budget_event(persona_id: i64, channel_id: i64, budget: &ContextBudget) -> Event {
    let mut data = serde_json::to_value(budget).unwrap_or_default();
    if let Some(obj) = data.as_object_mut() {
        obj.insert("persona_id".into(), persona_id.into());
        obj.insert("channel_id".into(), channel_id.into());
    }
    Event::new(EventType::AgentContextBudget, data)
}

/// Tool result text for the model. A failure reads `error: <detail>`,
/// followed by any output the tool still produced.
fn render_tool_result(output: &str, error: &str) -> String {
    if error.is_empty() {
        return output.to_string();
    }
    if output.is_empty() {
        format!("error: {error}")
    } else {
        format!("error: {error}\n{output}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_rendering() {
        assert_eq!(render_tool_result("a.txt\nb.txt", ""), "a.txt\nb.txt");
        assert_eq!(render_tool_result("", "command not allowed"), "error: command not allowed");
        assert_eq!(
            render_tool_result("not found body", "HTTP 404"),
            "error: HTTP 404\nnot found body"
        );
    }

    #[test]
    fn budget_event_carries_ids_and_fields() {
        let budget = ContextBudget {
            total_tokens: 100,
            history_messages: 3,
            exhausted: true,
            ..ContextBudget::default()
        };
        let event = budget_event(4, 9, &budget);
        assert_eq!(event.event_type, EventType::AgentContextBudget);
        assert_eq!(event.data["persona_id"], 4);
        assert_eq!(event.data["channel_id"], 9);
        assert_eq!(event.data["total_tokens"], 100);
        assert_eq!(event.data["history_messages"], 3);
        assert_eq!(event.data["exhausted"], true);
    }
}
