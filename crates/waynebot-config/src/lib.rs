// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Waynebot chat server.
//!
//! Provides layered loading (defaults, TOML file, `WAYNEBOT_*` environment),
//! strict unknown-key rejection with typo suggestions, and post-load
//! validation that reports every problem at once.
//!
//! # Usage
//!
//! ```no_run
//! use waynebot_config::load_and_validate;
//!
//! let config = load_and_validate(None).expect("config errors");
//! println!("listening on {}", config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::WaynebotConfig;

/// Load configuration and validate it.
///
/// Uses `path` when given, else `./waynebot.toml`. Figment errors are
/// converted to miette diagnostics with source spans where the offending file
/// can be read.
pub fn load_and_validate(path: Option<&Path>) -> Result<WaynebotConfig, Vec<ConfigError>> {
    let path = path.unwrap_or_else(|| Path::new(loader::DEFAULT_CONFIG_FILE));
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = collect_toml_sources(path);
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<WaynebotConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

fn collect_toml_sources(path: &Path) -> Vec<(String, String)> {
    std::fs::read_to_string(path)
        .map(|content| vec![(path.display().to_string(), content)])
        .unwrap_or_default()
}
