// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted LLM client for deterministic testing.
//!
//! Responses are popped from a FIFO queue. When the queue is empty the
//! fallback is returned, which defaults to a plain `"mock response"`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use waynebot_core::{ChatRequest, ChatResponse, LlmClient, ToolCall, WaynebotError};

type Scripted = Result<ChatResponse, String>;

pub struct MockLlm {
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Ok(Self::text("mock response", 10, 20)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Pre-load plain responses.
    pub fn with_responses(responses: Vec<ChatResponse>) -> Self {
        let llm = Self::new();
        for r in responses {
            llm.push(r);
        }
        llm
    }

    /// Return `response` for every call once the queue is drained.
    pub fn repeating(mut self, response: ChatResponse) -> Self {
        self.fallback = Ok(response);
        self
    }

    /// Fail every call once the queue is drained.
    pub fn failing(mut self, message: &str) -> Self {
        self.fallback = Err(message.to_string());
        self
    }

    pub fn push(&self, response: ChatResponse) {
        lock(&self.queue).push_back(Ok(response));
    }

    pub fn push_error(&self, message: &str) {
        lock(&self.queue).push_back(Err(message.to_string()));
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// A content-only response.
    pub fn text(content: &str, prompt_tokens: i64, completion_tokens: i64) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            tool_calls: Vec::new(),
            prompt_tokens,
            completion_tokens,
        }
    }

    /// A response requesting one tool call.
    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            prompt_tokens: 10,
            completion_tokens: 5,
        }
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, WaynebotError> {
        lock(&self.requests).push(request);
        let next = lock(&self.queue)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        next.map_err(WaynebotError::provider)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
