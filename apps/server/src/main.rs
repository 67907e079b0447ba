//! Livecast Server - headless live stream arbitration for one Cast device.
//!
//! Listens for stream notifications over MQTT and keeps the selected Cast
//! device playing the highest-priority live stream.

mod config;
mod mqtt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use livecast_core::{bootstrap_services, discover_device, Device, LoggingEventEmitter};
use tokio::signal;

use crate::config::ServerConfig;
use crate::mqtt::{subscriptions, MqttSource};

/// Livecast Server - plays the highest-priority live stream on a Cast device.
#[derive(Parser, Debug)]
#[command(name = "livecast-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "LIVECAST_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Friendly name of the device to use (overrides config file).
    #[arg(short = 'n', long, env = "LIVECAST_PREFERRED_DEVICE")]
    device_name: Option<String>,

    /// Device address, `host` or `host:port`; skips discovery.
    #[arg(short = 'a', long, env = "LIVECAST_DEVICE_ADDRESS")]
    device_address: Option<String>,

    /// MQTT broker URL (overrides config file).
    #[arg(short = 'm', long, env = "LIVECAST_MQTT_URL")]
    mqtt_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Livecast Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(name) = args.device_name {
        config.preferred_device = Some(name);
    }
    if let Some(address) = args.device_address {
        config.device_address = Some(address);
    }
    if let Some(url) = args.mqtt_url {
        config.mqtt_url = url;
    }
    config.validate().context("Invalid configuration")?;

    let core_config = config.to_core_config();
    let device = resolve_device(&config, &core_config).await?;
    log::info!("Controlling {}", device);

    let streams = config.stream_table();
    let filters = subscriptions(&config.topic_prefix, streams.names());
    let source = MqttSource::new(&config.mqtt_url, &config.mqtt_client_id, filters)
        .context("Invalid MQTT configuration")?;

    let services = bootstrap_services(
        &core_config,
        device,
        streams,
        config.stream_source(),
        Arc::new(LoggingEventEmitter),
    )
    .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    let mqtt_handle = tokio::spawn(
        source.run(services.actor.clone(), services.cancel_token.clone()),
    );

    log::info!("Listening for stream notifications on {}", config.mqtt_url);

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown
    services.shutdown().await;
    if let Err(e) = mqtt_handle.await {
        log::warn!("MQTT task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Uses the configured address, or discovers a device over mDNS.
async fn resolve_device(config: &ServerConfig, core: &livecast_core::Config) -> Result<Device> {
    let name = config
        .preferred_device
        .clone()
        .unwrap_or_else(|| "Cast device".to_string());

    if let Some(address) = &config.device_address {
        log::info!("Using configured device address {}", address);
        return Device::parse(address, name)
            .with_context(|| format!("Invalid device address {:?}", address));
    }

    log::info!(
        "Discovering Cast devices for {:?} (preferred: {:?})",
        core.discovery_timeout(),
        config.preferred_device
    );
    let discovered = discover_device(core.discovery_timeout(), config.preferred_device.as_deref())
        .await
        .context("No Cast device available. Set device_address or LIVECAST_DEVICE_ADDRESS")?;
    Ok(discovered.to_device())
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
