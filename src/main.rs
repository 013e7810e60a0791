//! Herald - game server chat bridge.
//!
//! Connects to an OneBot-compatible chat platform over a persistent
//! WebSocket and relays chat and events between it and a game server,
//! with a configurable command engine, message filtering and an
//! account-binding workflow on top.

mod binding;
mod bridge;
mod common;
mod config;
mod game;
mod protocol;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use binding::BindingStore;
use bridge::{Bridge, CommandRegistry, FilterEngine};
use common::scheduler::Scheduler;
use config::env::get_config_path;
use game::{BindEnforcer, ConsoleHost, GameServer, PerformanceMonitor, PerformanceSource};
use protocol::action::ActionSender;
use protocol::client::ProtocolClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Herald v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let cfg = config::load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Endpoint: {}", cfg.connection.endpoint);
    info!("  Groups: {:?}", cfg.chat.groups);
    info!(
        "  Reconnect: enabled={} delay={}s max_attempts={}",
        cfg.reconnect.enabled, cfg.reconnect.delay_secs, cfg.reconnect.max_attempts
    );
    info!(
        "  Binding: enabled={} mode={:?}",
        cfg.binding.enabled, cfg.binding.mode
    );
    info!("  Commands: {}", cfg.commands.len());

    // ============================================================
    // Build components with explicit dependency injection
    // ============================================================

    let (actions, action_rx) = ActionSender::new();
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Arc::new(Scheduler::new());
    let host = Arc::new(ConsoleHost::new());
    let game: Arc<dyn GameServer> = host.clone();
    let perf: Arc<dyn PerformanceSource> = host.clone();

    let store = Arc::new(BindingStore::open(cfg.binding.clone(), notice_tx).map_err(|e| {
        error!("Failed to open binding store: {}", e);
        e
    })?);

    let enforcer = Arc::new(BindEnforcer::new(
        cfg.force_bind.clone(),
        scheduler.clone(),
        game.clone(),
        store.clone(),
    ));

    let bridge = Arc::new(Bridge::new(
        &cfg,
        config_path.clone(),
        Arc::new(FilterEngine::new(&cfg.filter)),
        Arc::new(CommandRegistry::from_config(&cfg.commands)),
        store,
        enforcer,
        game,
        perf,
        actions.clone(),
    ));

    let monitor = PerformanceMonitor::new(
        cfg.performance.clone(),
        host.clone(),
        actions.clone(),
        cfg.chat.groups.clone(),
        scheduler.clone(),
    );
    monitor.start();

    // ============================================================
    // Connect and spawn tasks
    // ============================================================

    // First connect makes a single attempt; failing it is fatal by design.
    let ws = ProtocolClient::connect(&cfg.connection).await.map_err(|e| {
        error!("Failed to connect to {}: {}", cfg.connection.endpoint, e);
        e
    })?;

    let client = ProtocolClient::new(
        cfg.connection.clone(),
        cfg.reconnect.clone(),
        cfg.heartbeat.clone(),
        bridge.clone(),
        action_rx,
        shutdown_rx,
    );
    let mut client_task = tokio::spawn(client.run(ws));

    // Binding notices published by the store drive game-side reactions.
    let notice_bridge = bridge.clone();
    let notice_task = tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            notice_bridge.on_bind_completed(notice);
        }
    });

    // Stand-in game host: stdin lines become game-side events.
    let input_task = tokio::spawn(game::console::run_console_input(host, bridge));

    // ============================================================
    // Run until shutdown
    // ============================================================

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - closing connection...");
            true
        }
        _ = &mut client_task => {
            warn!("Connection task exited");
            false
        }
    };

    if shutdown {
        let _ = shutdown_tx.send(true);
        match tokio::time::timeout(Duration::from_secs(5), client_task).await {
            Ok(Ok(())) => info!("Connection closed gracefully"),
            Ok(Err(e)) => warn!("Connection task panicked: {}", e),
            Err(_) => warn!("Connection shutdown timed out"),
        }
    }

    monitor.stop();
    scheduler.shutdown();
    notice_task.abort();
    input_task.abort();

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
