//! uvc-sessiond
//!
//! Daemon coordinating the lifecycle of a single attached UVC camera:
//! attach detection, permission negotiation, control block acquisition,
//! and preview. USB work runs in a dedicated monitor thread; this entry
//! point only wires configuration, logging, and shutdown around it.

use anyhow::{Context, Result};
use clap::Parser;
use common::{MonitorCommand, SessionBridge, create_session_bridge, setup_logging};
use daemon::config::DaemonConfig;
use daemon::usb::spawn_monitor_worker;
use session::{PermissionState, SurfaceHandle};
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "uvc-sessiond")]
#[command(
    author,
    version,
    about = "UVC session daemon - coordinate camera attach, permission, and preview"
)]
#[command(long_about = "
Coordinates a single USB video class camera from physical attach through
permission grant, device open, and live preview, releasing everything on
detach or shutdown.

EXAMPLES:
    # Run with default config
    uvc-sessiond

    # Run with custom config
    uvc-sessiond --config /path/to/daemon.toml

    # List camera candidates without starting a session
    uvc-sessiond --list-devices

    # Bind the preview to a render surface handle provided by the host UI
    uvc-sessiond --surface 1

CONFIGURATION:
    The daemon looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/uvc-session/daemon.toml
    3. /etc/uvc-session/daemon.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List camera candidates and exit
    #[arg(long)]
    list_devices: bool,

    /// Render surface handle provided by the embedding UI (headless if absent)
    #[arg(long, value_name = "HANDLE")]
    surface: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = DaemonConfig::default();
        let path = DaemonConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        DaemonConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        DaemonConfig::load_or_default()
    };

    // CLI log level wins over the config value
    let log_level = args.log_level.as_deref().unwrap_or(&config.daemon.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("uvc-sessiond v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "preview: {}x{} {:?}",
        config.preview.width, config.preview.height, config.preview.format
    );

    let (bridge, channels) = create_session_bridge();
    let worker_handle = spawn_monitor_worker(channels, config);

    if args.list_devices {
        let result = list_devices_mode(bridge.clone()).await;
        shutdown_worker(bridge).await;
        join_worker(worker_handle);
        return result;
    }

    if let Some(handle) = args.surface {
        bridge
            .send_command(MonitorCommand::BindSurface {
                surface: SurfaceHandle(handle),
            })
            .await
            .context("Failed to bind render surface")?;
    }

    info!("Press Ctrl+C to shutdown");
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
        Err(e) => error!("Error waiting for Ctrl+C: {}", e),
    }

    shutdown_worker(bridge).await;
    join_worker(worker_handle);

    info!("Shutdown complete");
    Ok(())
}

/// List camera candidates and exit
async fn list_devices_mode(bridge: SessionBridge) -> Result<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    bridge
        .send_command(MonitorCommand::ListDevices { response: tx })
        .await
        .context("Failed to send ListDevices command")?;

    let listings = rx.await.context("Failed to receive device list")?;

    if listings.is_empty() {
        println!("No camera candidates found.");
    } else {
        println!("Found {} camera candidate(s):\n", listings.len());
        for listing in listings {
            let info = &listing.info;
            println!(
                "  {:04x}:{:04x} - {} [{}]",
                info.vendor_id,
                info.product_id,
                info.product.as_deref().unwrap_or("Unknown Product"),
                match listing.permission {
                    PermissionState::Granted => "permitted",
                    PermissionState::Denied => "access denied",
                    PermissionState::Unrequested => "permission required",
                }
            );
            println!("      {}", info.key);
        }
    }

    Ok(())
}

/// Ask the monitor thread to shut down
async fn shutdown_worker(bridge: SessionBridge) {
    info!("Shutting down usb monitor...");
    if let Err(e) = bridge.send_command(MonitorCommand::Shutdown).await {
        error!("Error sending shutdown command: {}", e);
    }
}

/// Wait for the monitor thread to exit
fn join_worker(handle: std::thread::JoinHandle<common::Result<()>>) {
    match handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("usb monitor exited with error: {}", e),
        Err(e) => error!("usb monitor thread panicked: {:?}", e),
    }
}
