// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Waynebot - a multi-tenant chat server where persona agents talk with
//! humans in channels.

mod http;
mod migrate;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "waynebot", version, about, long_about = None)]
struct Cli {
    /// Config file. Defaults to ./waynebot.toml when present.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run the chat server (default).
    Serve,
    /// Apply database migrations and print the schema version.
    Migrate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match waynebot_config::load_and_validate(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            waynebot_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Migrate => migrate::run_migrate(&config).await,
    };

    if let Err(e) = result {
        error!(error = %e, "waynebot exited with an error");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `waynebot={log_level},warn`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("waynebot={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
