// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Waynebot chat server.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! startup with a suggestion instead of being silently ignored.

use serde::{Deserialize, Deserializer, Serialize};

/// Top-level Waynebot configuration.
///
/// Built once at startup and passed down explicitly. Every section is
/// optional and defaults to the values the server ships with.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WaynebotConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Inbound email. Disabled unless host, user and pass are all set.
    #[serde(default)]
    pub imap: ImapConfig,

    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    #[serde(default)]
    pub agent: AgentConfig,
}

impl Default for WaynebotConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            sandbox: SandboxConfig::default(),
            imap: ImapConfig::default(),
            openrouter: OpenRouterConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Accepts a list or a comma-separated string.
    #[serde(
        default = "default_cors_origins",
        deserialize_with = "string_or_list"
    )]
    pub cors_origins: Vec<String>,

    /// Grace period for in-flight HTTP requests on shutdown.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: default_cors_origins(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_port() -> u16 {
    59731
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Directory receiving gzip archives of purged activity rows.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            archive_dir: default_archive_dir(),
        }
    }
}

fn default_db_path() -> String {
    "waynebot.db".to_string()
}

fn default_archive_dir() -> String {
    "./archives".to_string()
}

/// Bounds for the file, shell and HTTP tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    /// Fallback working directory when a channel has no project.
    #[serde(default = "default_sandbox_dir")]
    pub dir: String,

    /// Base command names `shell_exec` may run.
    #[serde(
        default = "default_allowed_commands",
        deserialize_with = "string_or_list"
    )]
    pub allowed_commands: Vec<String>,

    /// Hosts `http_fetch` refuses to contact.
    #[serde(
        default = "default_blocked_hosts",
        deserialize_with = "string_or_list"
    )]
    pub blocked_hosts: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            dir: default_sandbox_dir(),
            allowed_commands: default_allowed_commands(),
            blocked_hosts: default_blocked_hosts(),
        }
    }
}

fn default_sandbox_dir() -> String {
    "/tmp/waynebot-sandbox".to_string()
}

fn default_allowed_commands() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "wc", "grep", "find", "echo", "pwd", "mkdir", "touch",
        "sort", "uniq", "diff", "git",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Loopback and metadata addresses blocked by default.
pub fn default_blocked_hosts() -> Vec<String> {
    ["localhost", "127.0.0.1", "0.0.0.0", "169.254.169.254", "::1"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImapConfig {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_imap_port")]
    pub port: u16,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub pass: Option<String>,

    /// Channel name inbound mail is posted to.
    #[serde(default = "default_imap_channel")]
    pub channel: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl ImapConfig {
    /// True when host, user and pass are all present and non-empty.
    pub fn is_enabled(&self) -> bool {
        [&self.host, &self.user, &self.pass]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_imap_port(),
            user: None,
            pass: None,
            channel: default_imap_channel(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_imap_port() -> u16 {
    993
}

fn default_imap_channel() -> String {
    "email".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenRouterConfig {
    /// API key. `None` leaves the agents without an LLM and disables embeddings.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openrouter_base_url(),
        }
    }
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

/// Actor runtime tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Rescan interval when no broadcast wakes the actor.
    #[serde(default = "default_fallback_tick_secs")]
    pub fallback_tick_secs: u64,

    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Token limit handed to the context assembler.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            fallback_tick_secs: default_fallback_tick_secs(),
            max_tool_rounds: default_max_tool_rounds(),
            context_window: default_context_window(),
        }
    }
}

fn default_fallback_tick_secs() -> u64 {
    60
}

fn default_max_tool_rounds() -> usize {
    10
}

fn default_context_window() -> usize {
    200_000
}

/// Accept either a TOML array or a comma-separated string (the form
/// environment variables arrive in). Blank entries are dropped.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let items = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => s.split(',').map(str::to_string).collect(),
        OneOrMany::Many(v) => v,
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WaynebotConfig::default();
        assert_eq!(config.server.port, 59731);
        assert_eq!(config.storage.db_path, "waynebot.db");
        assert_eq!(config.storage.archive_dir, "./archives");
        assert_eq!(config.sandbox.dir, "/tmp/waynebot-sandbox");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.imap.port, 993);
        assert_eq!(config.imap.channel, "email");
        assert!(!config.imap.is_enabled());
        assert!(config.openrouter.api_key.is_none());
        assert_eq!(config.agent.max_tool_rounds, 10);
    }

    #[test]
    fn cors_origins_accepts_comma_string() {
        let config: WaynebotConfig = toml::from_str(
            r#"
[server]
cors_origins = "http://a.test, http://b.test,,"
"#,
        )
        .unwrap();
        assert_eq!(
            config.server.cors_origins,
            vec!["http://a.test", "http://b.test"]
        );
    }

    #[test]
    fn imap_enabled_requires_all_credentials() {
        let mut imap = ImapConfig {
            host: Some("imap.test".into()),
            user: Some("bot@test".into()),
            ..ImapConfig::default()
        };
        assert!(!imap.is_enabled());
        imap.pass = Some(String::new());
        assert!(!imap.is_enabled());
        imap.pass = Some("secret".into());
        assert!(imap.is_enabled());
    }
}
