// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `waynebot serve`: wires the store, hub, tools, actors, connectors, and
//! maintenance loops, serves HTTP, and tears everything down in order.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use waynebot_agent::cleanup::CLEANUP_INTERVAL;
use waynebot_agent::{
    ActorSettings, AgentServices, Archiver, Supervisor, install_signal_handler, run_cleanup_loop,
};
use waynebot_config::WaynebotConfig;
use waynebot_connector::{ConnectorRegistry, EmailConnector, EmailSettings, ImapConfig, ImapSource};
use waynebot_core::{EmbeddingClient, LlmClient, WaynebotError};
use waynebot_hub::Hub;
use waynebot_openrouter::OpenRouterClient;
use waynebot_skill::builtin::{register_builtins, register_store_tools};
use waynebot_skill::{Sandbox, ToolRegistry};
use waynebot_storage::Database;
use waynebot_storage::queries::channels;

use crate::http::{AppState, router};

pub async fn run_serve(config: WaynebotConfig) -> Result<(), WaynebotError> {
    info!(port = config.server.port, db_path = %config.storage.db_path, "starting waynebot serve");

    let db = Database::open(&config.storage.db_path).await?;
    info!(version = db.schema_version().await?, "store ready");

    let hub = Hub::start();

    let (llm, embedder) = build_clients(&config)?;
    let tools = build_tools(&config, &db, &hub, embedder.clone()).await?;
    info!(tools = ?tools.names(), "tool registry ready");

    let settings = ActorSettings {
        fallback_tick: Duration::from_secs(config.agent.fallback_tick_secs),
        max_tool_rounds: config.agent.max_tool_rounds,
        context_window: config.agent.context_window,
    };
    let services = AgentServices::new(
        db.clone(),
        hub.clone(),
        llm,
        Arc::new(tools),
        embedder,
        settings,
    );
    let status = services.status.clone();
    let supervisor = Supervisor::new(services);
    supervisor.start_all().await?;

    let root = CancellationToken::new();
    install_signal_handler(root.clone());

    // Connectors and maintenance get their own scopes so they are cancelled
    // only after HTTP has drained.
    let mut connectors = build_connectors(&config, &db, &hub).await?;
    connectors.start_all(&CancellationToken::new());
    info!(count = connectors.len(), "connectors started");

    let maintenance = CancellationToken::new();
    let mut background = JoinSet::new();
    background.spawn(
        Archiver::new(db.clone(), &config.storage.archive_dir).run(maintenance.clone()),
    );
    background.spawn(run_cleanup_loop(db.clone(), CLEANUP_INTERVAL, maintenance.clone()));

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WaynebotError::Internal(format!("failed to bind {addr}: {e}")))?;
    info!(addr = %addr, "listening");

    let app = router(
        AppState {
            db: db.clone(),
            hub: hub.clone(),
            status,
        },
        &config.server.cors_origins,
    );
    let mut server = tokio::spawn({
        let root = root.clone();
        let shutdown = root.clone().cancelled_owned();
        async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "http server failed");
                root.cancel();
            }
        }
    });

    root.cancelled().await;
    info!("shutdown requested");

    // HTTP first, bounded by the grace period.
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    if tokio::time::timeout(grace, &mut server).await.is_err() {
        warn!(grace_secs = grace.as_secs(), "http server did not drain in time, aborting");
        server.abort();
    }

    connectors.stop_all().await;
    debug!("connectors stopped");

    supervisor.stop_all().await;

    maintenance.cancel();
    while background.join_next().await.is_some() {}
    debug!("maintenance loops stopped");

    hub.stop().await;
    db.close().await?;

    info!("waynebot serve shutdown complete");
    Ok(())
}

/// One OpenRouter client serves both chat and embeddings. Without an API key
/// the chat client still exists (calls fail and the actor reports `error`)
/// but memory extraction and retrieval are off.
fn build_clients(
    config: &WaynebotConfig,
) -> Result<(Arc<dyn LlmClient>, Option<Arc<dyn EmbeddingClient>>), WaynebotError> {
    let api_key = config.openrouter.api_key.as_deref().unwrap_or_default();
    let client = Arc::new(OpenRouterClient::new(api_key, &config.openrouter.base_url)?);
    let llm: Arc<dyn LlmClient> = client.clone();
    if api_key.is_empty() {
        warn!("no OpenRouter API key configured; agents will fail to respond");
        return Ok((llm, None));
    }
    let embedder: Arc<dyn EmbeddingClient> = client;
    Ok((llm, Some(embedder)))
}

async fn build_tools(
    config: &WaynebotConfig,
    db: &Database,
    hub: &Hub,
    embedder: Option<Arc<dyn EmbeddingClient>>,
) -> Result<ToolRegistry, WaynebotError> {
    if let Err(e) = tokio::fs::create_dir_all(&config.sandbox.dir).await {
        warn!(dir = %config.sandbox.dir, error = %e, "could not create sandbox directory");
    }
    let sandbox = Sandbox {
        allowed_commands: config.sandbox.allowed_commands.clone(),
        blocked_hosts: config.sandbox.blocked_hosts.clone(),
        ..Sandbox::new(&config.sandbox.dir)
    };

    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry, Arc::new(sandbox))?;
    register_store_tools(&mut registry, db.clone(), Some(hub.clone()), embedder)?;
    Ok(registry)
}

async fn build_connectors(
    config: &WaynebotConfig,
    db: &Database,
    hub: &Hub,
) -> Result<ConnectorRegistry, WaynebotError> {
    let mut registry = ConnectorRegistry::new();

    let imap = &config.imap;
    match (&imap.host, &imap.user, &imap.pass) {
        (Some(host), Some(user), Some(pass)) if imap.is_enabled() => {
            let channel = channels::ensure_channel(db, &imap.channel).await?;
            let settings = EmailSettings {
                poll_every: Duration::from_secs(imap.poll_interval_secs),
                ..EmailSettings::new(user.clone(), channel.id)
            };
            let source = ImapSource::new(ImapConfig::new(
                host.clone(),
                imap.port,
                user.clone(),
                pass.clone(),
            ))?;
            registry.register(Arc::new(EmailConnector::new(
                settings,
                Box::new(source),
                db.clone(),
                hub.clone(),
            )));
            info!(host = %host, channel = %imap.channel, "email connector configured");
        }
        _ => debug!("email connector disabled"),
    }

    Ok(registry)
}
