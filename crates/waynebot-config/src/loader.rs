// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order (later overrides earlier): compiled defaults, an optional TOML
//! file, then `WAYNEBOT_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::WaynebotConfig;

/// File consulted when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "waynebot.toml";

/// Load configuration from `./waynebot.toml` (if present) with env overrides.
pub fn load_config() -> Result<WaynebotConfig, figment::Error> {
    build_figment(Path::new(DEFAULT_CONFIG_FILE)).extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WaynebotConfig, figment::Error> {
    build_figment(path).extract()
}

/// Load configuration from a TOML string only, without env overrides.
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<WaynebotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WaynebotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Build the Figment used for loading, before extraction.
///
/// A missing file is not an error; figment treats it as an empty provider.
pub fn build_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WaynebotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
}

/// Map flat `WAYNEBOT_*` variables onto the nested config sections.
///
/// The short operator-facing names (`WAYNEBOT_PORT`, `WAYNEBOT_DB_PATH`, ...)
/// are mapped explicitly; everything else uses a `<section>_<key>` prefix.
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores themselves.
fn env_provider() -> Env {
    Env::prefixed("WAYNEBOT_").map(|key| {
        let mapped = match key.as_str() {
            "port" => "server.port".to_string(),
            "cors_origins" => "server.cors_origins".to_string(),
            "db_path" => "storage.db_path".to_string(),
            "archive_dir" => "storage.archive_dir".to_string(),
            "sandbox_dir" => "sandbox.dir".to_string(),
            "openrouter_key" => "openrouter.api_key".to_string(),
            other => map_section_prefix(other),
        };
        mapped.into()
    })
}

fn map_section_prefix(key: &str) -> String {
    const SECTIONS: [&str; 6] = ["server", "storage", "sandbox", "imap", "openrouter", "agent"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
