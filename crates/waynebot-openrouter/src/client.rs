// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenRouter API.
//!
//! One [`OpenRouterClient`] serves both chat completions and embeddings. The
//! client never retries; every failure surfaces as a provider error and the
//! actor's next wake is the retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use waynebot_core::{ChatRequest, ChatResponse, EmbeddingClient, LlmClient, WaynebotError};

use crate::types::{
    ApiErrorResponse, CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Embedding model used for memories.
pub const EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";

/// Dimension of [`EMBEDDING_MODEL`] vectors.
pub const EMBEDDING_DIMS: usize = 1536;

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterClient {
    /// Build a client authenticating with `api_key` against `base_url`
    /// (normally [`DEFAULT_BASE_URL`]).
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, WaynebotError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| WaynebotError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| WaynebotError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, WaynebotError>
    where
        B: serde::Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{endpoint}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| WaynebotError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, endpoint, "openrouter response received");
        let text = response.text().await.map_err(|e| WaynebotError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            if is_transient_error(status) {
                warn!(status = %status, endpoint, "transient provider error");
            }
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => format!("OpenRouter API error ({status}): {}", api_err.error.message),
                Err(_) => format!("API returned {status}: {text}"),
            };
            return Err(WaynebotError::provider(message));
        }

        serde_json::from_str(&text).map_err(|e| WaynebotError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, WaynebotError> {
        let body = CompletionRequest::from(request);
        let completion: CompletionResponse = self.post_json("/chat/completions", &body).await?;

        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(WaynebotError::provider("chat completion: no choices returned"));
        };
        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(Into::into)
                .collect(),
            prompt_tokens: completion.usage.prompt_tokens,
            completion_tokens: completion.usage.completion_tokens,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenRouterClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, WaynebotError> {
        let body = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: vec![text],
        };
        let resp: EmbeddingResponse = self.post_json("/embeddings", &body).await?;
        resp.data
            .into_iter()
            .find(|d| d.index == 0)
            .map(|d| d.embedding)
            .ok_or_else(|| WaynebotError::provider("embedding: no data returned"))
    }
}

/// Rate limiting and server-side failures.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}
