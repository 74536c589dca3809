// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::WaynebotConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &WaynebotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        fail(format!(
            "log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.log_level
        ));
    }

    if config.server.port == 0 {
        fail("server.port must not be 0".to_string());
    }

    if config.storage.db_path.trim().is_empty() {
        fail("storage.db_path must not be empty".to_string());
    }

    if config.storage.archive_dir.trim().is_empty() {
        fail("storage.archive_dir must not be empty".to_string());
    }

    if config.sandbox.dir.trim().is_empty() {
        fail("sandbox.dir must not be empty".to_string());
    }

    // Partially configured mail is almost always a mistake.
    let imap = &config.imap;
    let set = [&imap.host, &imap.user, &imap.pass]
        .iter()
        .filter(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
        .count();
    if set != 0 && set != 3 {
        fail("imap.host, imap.user and imap.pass must be set together".to_string());
    }
    if imap.is_enabled() && imap.poll_interval_secs == 0 {
        fail("imap.poll_interval_secs must be greater than 0".to_string());
    }
    if imap.is_enabled() && imap.channel.trim().is_empty() {
        fail("imap.channel must not be empty".to_string());
    }

    if config.agent.max_tool_rounds == 0 {
        fail("agent.max_tool_rounds must be greater than 0".to_string());
    }
    if config.agent.context_window == 0 {
        fail("agent.context_window must be greater than 0".to_string());
    }
    if config.agent.fallback_tick_secs == 0 {
        fail("agent.fallback_tick_secs must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
