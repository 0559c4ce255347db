//! Playback Coordinator (chorus-pc) - Main entry point
//!
//! Wires the collaborators, registry and HTTP server together and runs
//! until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chorus_common::events::EventBus;
use chorus_pc::api::{self, AppContext};
use chorus_pc::collab::{HttpAudioNode, HttpMembership};
use chorus_pc::config::TomlConfig;
use chorus_pc::SessionRegistry;

/// Command-line arguments for chorus-pc
#[derive(Parser, Debug)]
#[command(name = "chorus-pc")]
#[command(about = "Shared-control playback coordinator")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CHORUS_PC_CONFIG")]
    config: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "CHORUS_PC_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chorus_pc=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = chorus_common::config::resolve_config_file(
        args.config.as_deref(),
        "CHORUS_PC_CONFIG",
    )
    .context("Failed to resolve config file")?;

    let config = match &config_path {
        Some(path) => TomlConfig::load(path)
            .await
            .context("Failed to load configuration")?,
        None => {
            info!("No configuration file found, using built-in defaults");
            TomlConfig::default()
        }
    };
    let port = args.port.unwrap_or(config.port);

    info!("Starting Chorus Playback Coordinator on port {}", port);
    info!("Audio node: {}", config.node.base_url);
    info!("Membership directory: {}", config.membership.base_url);

    let node = Arc::new(HttpAudioNode::new(
        config.node.base_url.clone(),
        config.node.password.clone().unwrap_or_default(),
    ));
    let membership = Arc::new(HttpMembership::new(config.membership.base_url.clone()));
    let events = Arc::new(EventBus::new(config.event_capacity));

    let registry = Arc::new(SessionRegistry::new(
        node,
        membership,
        events.clone(),
        config.node.retry_limit,
    ));

    // Periodic flush of coalesced per-session update notifications
    let refresh_task = registry.spawn_refresh(config.refresh_interval());

    let app = api::create_router(AppContext {
        registry,
        events,
        port,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    refresh_task.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
