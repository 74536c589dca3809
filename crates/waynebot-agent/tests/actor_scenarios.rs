// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end actor behavior against a real store and hub with a scripted LLM.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use waynebot_agent::actor::CONTEXT_FULL_MESSAGE;
use waynebot_agent::{Actor, ActorSettings, AgentServices, Supervisor};
use waynebot_core::{
    AgentStatus, AuthorKind, ChatMessage, Event, EventType, NewPersona, WaynebotError,
};
use waynebot_skill::{Tool, ToolContext, ToolOutput, ToolRegistry};
use waynebot_storage::NewLlmCall;
use waynebot_storage::queries::{activity, messages};
use waynebot_test_utils::{EventLog, MockLlm, TestHarness};

/// Stand-in for `shell_exec` that records the persona it ran for.
struct FakeShell;

#[async_trait]
impl Tool for FakeShell {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Run a shell command"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {"command": {"type": "string"}}})
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<ToolOutput, WaynebotError> {
        assert_ne!(ctx.persona_id, 0);
        match input["command"].as_str() {
            Some("ls") => Ok(ToolOutput::ok("a b c")),
            Some(other) => Ok(ToolOutput::failed("", format!("command not allowed: {other}"))),
            None => Err(WaynebotError::Tool("command is required".into())),
        }
    }
}

struct Fixture {
    h: TestHarness,
    llm: Arc<MockLlm>,
    services: AgentServices,
}

impl Fixture {
    async fn new(llm: MockLlm) -> Self {
        Self::with(TestHarness::new().await.unwrap(), llm, ActorSettings::default())
    }

    fn with(h: TestHarness, llm: MockLlm, settings: ActorSettings) -> Self {
        let llm = Arc::new(llm);
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(FakeShell)).unwrap();
        let services = AgentServices::new(
            h.db.clone(),
            h.hub.clone(),
            llm.clone(),
            Arc::new(tools),
            None,
            settings,
        );
        Self { h, llm, services }
    }

    fn actor(&self) -> Actor {
        Actor::new(self.h.persona.clone(), self.services.clone())
    }

    async fn pass(&self) {
        self.actor().process_channels(&CancellationToken::new()).await;
    }

    async fn cursor(&self) -> i64 {
        self.services
            .cursors
            .get(self.h.persona.id, self.h.channel.id)
            .await
            .unwrap()
    }

    /// Broadcasts queued so far. The hub handles commands in order, so a
    /// client count round-trip flushes every earlier broadcast.
    async fn events(&self, log: &mut EventLog) -> Vec<Event> {
        self.h.hub.client_count().await;
        log.drain()
    }
}

fn statuses(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.event_type == EventType::AgentStatus)
        .map(|e| e.data["status"].as_str().unwrap_or_default().to_string())
        .collect()
}

fn count(events: &[Event], kind: EventType) -> usize {
    events.iter().filter(|e| e.event_type == kind).count()
}

#[tokio::test]
async fn human_message_gets_a_reply() {
    let f = Fixture::new(MockLlm::with_responses(vec![MockLlm::text("hello", 10, 5)])).await;
    let mut log = f.h.event_log().await.unwrap();
    let hi = f.h.post_human("alice", "hi").await.unwrap();

    f.pass().await;

    let all = f.h.messages().await.unwrap();
    assert_eq!(all.len(), 2);
    let reply = &all[1];
    assert_eq!(reply.content, "hello");
    assert_eq!(reply.author_type, AuthorKind::Agent);
    assert_eq!(reply.author_id, f.h.persona.id);
    assert_eq!(f.cursor().await, hi.id);
    assert!(f.services.decision.last_reply(f.h.persona.id, f.h.channel.id).is_some());

    let events = f.events(&mut log).await;
    assert_eq!(statuses(&events), ["thinking", "idle"]);
    assert_eq!(count(&events, EventType::AgentLlmCall), 1);
    assert_eq!(count(&events, EventType::AgentContextBudget), 1);
    assert_eq!(count(&events, EventType::NewMessage), 2);

    let calls = activity::list_llm_calls(&f.h.db, f.h.persona.id, 10).await.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].prompt_tokens, calls[0].completion_tokens), (10, 5));

    let request = &f.llm.requests()[0];
    assert!(matches!(request.messages[0], ChatMessage::System { .. }));
    assert_eq!(request.messages.last().unwrap(), &ChatMessage::user("alice: hi"));
    assert_eq!(request.tools.len(), 1);
}

#[tokio::test]
async fn own_reply_advances_cursor_without_responding() {
    let f = Fixture::new(MockLlm::new()).await;
    f.h.post_human("alice", "hi").await.unwrap();
    f.pass().await;
    assert_eq!(f.llm.call_count(), 1);

    // The reply is new to the cursor but authored by the persona itself.
    f.pass().await;
    assert_eq!(f.llm.call_count(), 1);
    let last = f.h.messages().await.unwrap().pop().unwrap();
    assert_eq!(f.cursor().await, last.id);
}

#[tokio::test]
async fn tool_round_then_reply() {
    let f = Fixture::new(MockLlm::with_responses(vec![
        MockLlm::tool_call("call_1", "shell_exec", json!({"command": "ls"})),
        MockLlm::text("done", 20, 5),
    ]))
    .await;
    let mut log = f.h.event_log().await.unwrap();
    f.h.post_human("alice", "list the files").await.unwrap();

    f.pass().await;

    let calls = activity::list_llm_calls(&f.h.db, f.h.persona.id, 10).await.unwrap();
    assert_eq!(calls.len(), 2);
    let runs = activity::list_tool_executions(&f.h.db, f.h.persona.id, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].tool_name, "shell_exec");
    assert_eq!(runs[0].output_text, "a b c");
    assert_eq!(runs[0].error_text, "");

    let all = f.h.messages().await.unwrap();
    assert_eq!(all.last().unwrap().content, "done");

    // Second request carries the assistant tool-call turn and its result.
    let second = &f.llm.requests()[1];
    let n = second.messages.len();
    assert!(matches!(
        &second.messages[n - 2],
        ChatMessage::Assistant { tool_calls, .. } if tool_calls[0].id == "call_1"
    ));
    assert_eq!(second.messages[n - 1], ChatMessage::tool("call_1", "a b c"));

    let events = f.events(&mut log).await;
    assert_eq!(statuses(&events), ["thinking", "tool_call", "idle"]);
    assert_eq!(count(&events, EventType::AgentLlmCall), 2);
    assert_eq!(count(&events, EventType::AgentToolExecution), 1);
}

#[tokio::test]
async fn tool_failures_reach_the_model_as_errors() {
    let f = Fixture::new(MockLlm::with_responses(vec![
        ChatResponseBuilder::calls(&[
            ("c1", "shell_exec", json!({"command": "rm -rf /"})),
            ("c2", "no_such_tool", json!({})),
        ]),
        MockLlm::text("sorry", 1, 1),
    ]))
    .await;
    f.h.post_human("alice", "clean up").await.unwrap();

    f.pass().await;

    let second = &f.llm.requests()[1];
    let n = second.messages.len();
    assert_eq!(
        second.messages[n - 2],
        ChatMessage::tool("c1", "error: command not allowed: rm -rf /")
    );
    assert_eq!(
        second.messages[n - 1],
        ChatMessage::tool("c2", "error: unknown tool \"no_such_tool\"")
    );

    let runs = activity::list_tool_executions(&f.h.db, f.h.persona.id, 10).await.unwrap();
    assert_eq!(runs.len(), 2);
    // Newest first.
    assert_eq!(runs[0].error_text, "unknown tool \"no_such_tool\"");
    assert_eq!(runs[1].error_text, "command not allowed: rm -rf /");
}

#[tokio::test]
async fn tool_loop_stops_after_round_limit() {
    let looping = MockLlm::new().repeating(MockLlm::tool_call(
        "call_x",
        "shell_exec",
        json!({"command": "ls"}),
    ));
    let f = Fixture::new(looping).await;
    let mut log = f.h.event_log().await.unwrap();
    f.h.post_human("alice", "go forever").await.unwrap();

    f.pass().await;

    assert_eq!(f.llm.call_count(), 10);
    assert_eq!(f.h.messages().await.unwrap().len(), 1);
    assert_eq!(
        activity::list_tool_executions(&f.h.db, f.h.persona.id, 100)
            .await
            .unwrap()
            .len(),
        10
    );
    let events = f.events(&mut log).await;
    assert_eq!(statuses(&events).last().map(String::as_str), Some("idle"));
    assert!(f.services.decision.last_reply(f.h.persona.id, f.h.channel.id).is_none());
}

#[tokio::test]
async fn budget_exceeded_is_silent() {
    let h = TestHarness::with_persona(NewPersona {
        cooldown_secs: 0,
        max_tokens_per_hour: 100,
        ..NewPersona::new("bot", "You are a test assistant.")
    })
    .await
    .unwrap();
    activity::insert_llm_call(
        &h.db,
        NewLlmCall {
            persona_id: h.persona.id,
            channel_id: h.channel.id,
            model: "m".into(),
            messages_json: "[]".into(),
            response_json: "{}".into(),
            prompt_tokens: 60,
            completion_tokens: 60,
        },
    )
    .await
    .unwrap();
    let f = Fixture::with(h, MockLlm::new(), ActorSettings::default());
    let mut log = f.h.event_log().await.unwrap();
    let hi = f.h.post_human("alice", "hi").await.unwrap();

    f.pass().await;

    assert_eq!(f.llm.call_count(), 0);
    assert_eq!(f.services.status.get(f.h.persona.id), AgentStatus::BudgetExceeded);
    assert_eq!(f.h.messages().await.unwrap().len(), 1);
    assert_eq!(f.cursor().await, hi.id);
    let events = f.events(&mut log).await;
    assert_eq!(statuses(&events), ["budget_exceeded"]);
}

#[tokio::test]
async fn mention_overrides_cooldown() {
    let h = TestHarness::with_persona(NewPersona {
        cooldown_secs: 3600,
        ..NewPersona::new("bot", "You are a test assistant.")
    })
    .await
    .unwrap();
    let f = Fixture::with(h, MockLlm::new(), ActorSettings::default());
    let (pid, cid) = (f.h.persona.id, f.h.channel.id);
    f.services.decision.record_response(pid, cid);
    let before = f.services.decision.last_reply(pid, cid).unwrap();

    f.h.post_human("alice", "still there?").await.unwrap();
    f.pass().await;
    assert_eq!(f.llm.call_count(), 0);

    f.h.post_human("alice", "hey @Bot help").await.unwrap();
    f.pass().await;
    assert_eq!(f.llm.call_count(), 1);
    assert_eq!(f.h.messages().await.unwrap().len(), 3);
    assert!(f.services.decision.last_reply(pid, cid).unwrap() >= before);
}

#[tokio::test]
async fn tiny_context_window_posts_context_full() {
    let h = TestHarness::with_persona(NewPersona {
        cooldown_secs: 0,
        ..NewPersona::new("bot", "x".repeat(800))
    })
    .await
    .unwrap();
    let settings = ActorSettings {
        context_window: 100,
        ..ActorSettings::default()
    };
    let f = Fixture::with(h, MockLlm::new(), settings);
    let mut log = f.h.event_log().await.unwrap();
    f.h.post_human("alice", "hi").await.unwrap();

    f.pass().await;

    assert_eq!(f.llm.call_count(), 0);
    assert_eq!(f.services.status.get(f.h.persona.id), AgentStatus::ContextFull);
    let last = f.h.messages().await.unwrap().pop().unwrap();
    assert_eq!(last.content, CONTEXT_FULL_MESSAGE);
    assert_eq!(last.author_type, AuthorKind::Agent);

    let events = f.events(&mut log).await;
    assert_eq!(statuses(&events), ["thinking", "context_full"]);
    let budget = events
        .iter()
        .find(|e| e.event_type == EventType::AgentContextBudget)
        .unwrap();
    assert_eq!(budget.data["exhausted"], true);
    assert_eq!(budget.data["history_messages"], 0);
}

#[tokio::test]
async fn llm_error_sets_error_status() {
    let f = Fixture::new(MockLlm::new().failing("upstream 503")).await;
    let hi = f.h.post_human("alice", "hi").await.unwrap();

    f.pass().await;

    assert_eq!(f.services.status.get(f.h.persona.id), AgentStatus::Error);
    assert_eq!(f.h.messages().await.unwrap().len(), 1);
    assert_eq!(f.cursor().await, hi.id);
}

#[tokio::test]
async fn running_actor_wakes_on_broadcast() {
    let f = Fixture::new(MockLlm::with_responses(vec![MockLlm::text("pong", 1, 1)])).await;
    let mut log = f.h.event_log().await.unwrap();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(f.actor().run(cancel.clone()));

    f.h.post_human("alice", "ping").await.unwrap();
    let reply = loop {
        let event = log.next_of(EventType::NewMessage).await.expect("no reply");
        if event.data["author_type"] == "agent" {
            break event;
        }
    };
    assert_eq!(reply.data["content"], "pong");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(f.services.status.get(f.h.persona.id), AgentStatus::Stopped);
}

#[tokio::test]
async fn supervisor_runs_actors_end_to_end() {
    let f = Fixture::new(MockLlm::with_responses(vec![MockLlm::text("hi alice", 1, 1)])).await;
    let sup = Supervisor::new(f.services.clone());
    sup.start_all().await.unwrap();
    let mut log = f.h.event_log().await.unwrap();

    f.h.post_human("alice", "hello").await.unwrap();
    loop {
        let event = log.next_of(EventType::NewMessage).await.expect("no reply");
        if event.data["author_type"] == "agent" {
            break;
        }
    }

    sup.stop_all().await;
    assert_eq!(sup.status().get(f.h.persona.id), AgentStatus::Stopped);
    let stored = messages::get_recent_messages(&f.h.db, f.h.channel.id, 1)
        .await
        .unwrap();
    assert_eq!(stored[0].content, "hi alice");
}

/// Responses with several tool calls in one turn.
struct ChatResponseBuilder;

impl ChatResponseBuilder {
    fn calls(calls: &[(&str, &str, serde_json::Value)]) -> waynebot_core::ChatResponse {
        waynebot_core::ChatResponse {
            content: String::new(),
            tool_calls: calls
                .iter()
                .map(|(id, name, args)| waynebot_core::ToolCall {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                    arguments: args.to_string(),
                })
                .collect(),
            prompt_tokens: 5,
            completion_tokens: 5,
        }
    }
}
