// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Waynebot chat server.

use thiserror::Error;

/// The error type shared by the store, the tool sandbox, the provider clients
/// and the agent runtime.
#[derive(Debug, Error)]
pub enum WaynebotError {
    /// A lookup returned no row.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or referential violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Shape, range, or path-escape rejection.
    #[error("validation error: {0}")]
    Validation(String),

    /// Credential missing, expired, or invalid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The persona spent its hourly token allowance.
    #[error("hourly token budget exceeded for persona {persona_id}")]
    BudgetExceeded { persona_id: i64 },

    /// System prompt and documents leave no room for any history.
    #[error("context window full for persona {persona_id} in channel {channel_id}")]
    ContextFull { persona_id: i64, channel_id: i64 },

    /// A tool invocation failed. The message is shown to the model verbatim.
    #[error("{0}")]
    Tool(String),

    /// Storage backend errors (busy database, query failure, I/O).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM or embedding provider errors (network failure, 5xx, malformed reply).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Configuration errors detected at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WaynebotError {
    /// Whether the caller may retry the operation later.
    ///
    /// The actor loop never retries on its own; an unadvanced cursor makes the
    /// next wake reprocess the same messages.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WaynebotError::Storage { .. }
                | WaynebotError::Provider { .. }
                | WaynebotError::Timeout { .. }
        )
    }

    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        WaynebotError::Provider {
            message: message.into(),
            source: None,
        }
    }
}
