//! Sonos Relay - headless daemon playing voice assistant audio on Sonos rooms.
//!
//! Connects to the Hermes MQTT bus, discovers Sonos rooms on the local
//! network and plays every spoken response on the room mapped to its site.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sonos_relay_core::{bootstrap, PlaybackMode};
use tokio::signal;

use crate::config::ServerConfig;

/// Sonos Relay - plays Hermes voice assistant audio on Sonos speakers.
#[derive(Parser, Debug)]
#[command(name = "sonos-relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "RELAY_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// HTTP port (overrides config file and HTTP_PORT).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Host advertised to speakers (overrides config file and HTTP_HOST).
    #[arg(short = 'a', long)]
    advertise_host: Option<String>,

    /// How clips reach a room: queue or interrupt.
    #[arg(short = 'm', long, env = "RELAY_PLAYBACK_MODE")]
    playback_mode: Option<PlaybackMode>,

    /// Pause rooms while the assistant listens.
    #[arg(long, env = "RELAY_HOTWORD")]
    hotword: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Sonos Relay v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(host) = args.advertise_host {
        config.http_host = Some(host);
    }
    if let Some(mode) = args.playback_mode {
        config.playback_mode = mode;
    }
    if args.hotword {
        config.hotword = true;
    }

    let core_config = config.to_core_config()?;
    log::info!(
        "Configuration: http_port={}, advertise_host={}, sites={}, mode={:?}, hotword={}",
        core_config.http_port,
        core_config.advertise_host.as_deref().unwrap_or("auto"),
        core_config.site_rooms.len(),
        core_config.playback_mode,
        core_config.hotword
    );

    let services = bootstrap(&core_config).await.context(
        "Failed to start. If auto-detection picked the wrong address, \
         set HTTP_HOST to an IP the Sonos speakers can reach.",
    )?;
    log::info!(
        "Relay ready: {} room(s) on {}:{}",
        services.rooms.len(),
        services.network.advertise_host(),
        services.network.port()
    );

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");
    services.shutdown().await;

    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
