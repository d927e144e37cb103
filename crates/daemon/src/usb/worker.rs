//! USB monitor thread
//!
//! Dedicated thread owning the coordinator and the libusb context. Runs
//! the libusb event loop, drains the session event queue, and processes
//! commands from the Tokio runtime. Because this loop is the only
//! consumer of session events, all coordinator transitions are serialized
//! here no matter which thread produced the event.

use crate::camera::TracingCamera;
use crate::config::DaemonConfig;
use crate::coordinator::Coordinator;
use crate::usb::RusbMonitor;
use common::{MonitorChannels, MonitorCommand};
use rusb::UsbContext;
use session::{DeviceListing, UsbSubsystem};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Monitor thread state: the coordinator plus its channel endpoints
pub struct MonitorWorkerThread {
    coordinator: Coordinator<RusbMonitor, TracingCamera>,
    channels: MonitorChannels,
}

impl MonitorWorkerThread {
    /// Build the monitor, wire it into the coordinator, and start it
    pub fn new(channels: MonitorChannels, config: &DaemonConfig) -> common::Result<Self> {
        let monitor = RusbMonitor::new(channels.event_sender(), config.usb.filters.clone())
            .map_err(|e| common::Error::Usb(format!("libusb context: {e}")))?;

        let mut coordinator =
            Coordinator::new(monitor, TracingCamera::new(), config.preview.clone());
        coordinator.start()?;

        Ok(Self {
            coordinator,
            channels,
        })
    }

    /// Run the monitor thread event loop
    ///
    /// Each iteration: process one pending command, drain session events
    /// into the coordinator, then let libusb deliver hot-plug callbacks
    /// with a timeout. Continues until a Shutdown command arrives.
    pub fn run(mut self) -> common::Result<()> {
        info!("usb monitor thread started");

        loop {
            match self.channels.try_recv_command() {
                Some(MonitorCommand::Shutdown) => {
                    info!("usb monitor shutting down");
                    break;
                }
                Some(cmd) => self.handle_command(cmd),
                None => {}
            }

            while let Some(event) = self.channels.try_recv_event() {
                self.coordinator.handle_event(event);
            }

            // The timeout paces the loop and keeps command latency bounded
            let timeout = Duration::from_millis(100);
            match self.coordinator.usb().context().handle_events(Some(timeout)) {
                Ok(()) => {}
                Err(rusb::Error::Interrupted) => {
                    debug!("usb event handling interrupted");
                }
                Err(e) => {
                    warn!("error handling usb events: {}", e);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }

        self.coordinator.destroy();
        info!("usb monitor thread stopped");
        Ok(())
    }

    fn handle_command(&mut self, cmd: MonitorCommand) {
        match cmd {
            MonitorCommand::ListDevices { response } => {
                let usb = self.coordinator.usb();
                let listings: Vec<DeviceListing> = usb
                    .list_attached()
                    .into_iter()
                    .map(|info| DeviceListing {
                        permission: usb.permission_state(info.key),
                        info,
                    })
                    .collect();
                debug!("listing {} camera candidates", listings.len());
                let _ = response.send(listings);
            }

            MonitorCommand::BindSurface { surface } => {
                self.coordinator.bind_surface(surface);
            }

            MonitorCommand::ReleaseSurface => {
                self.coordinator.release_surface();
            }

            MonitorCommand::Stop => {
                self.coordinator.stop();
            }

            MonitorCommand::Start => {
                if let Err(e) = self.coordinator.start() {
                    warn!("coordinator restart failed: {}", e);
                }
            }

            MonitorCommand::Shutdown => {
                // Handled in the main loop
                unreachable!()
            }
        }
    }
}

/// Spawn the USB monitor thread
///
/// Creates a dedicated OS thread for the coordinator and libusb event
/// loop. The thread runs until a Shutdown command is received.
pub fn spawn_monitor_worker(
    channels: MonitorChannels,
    config: DaemonConfig,
) -> std::thread::JoinHandle<common::Result<()>> {
    std::thread::Builder::new()
        .name("usb-monitor".to_string())
        .spawn(move || {
            let worker = MonitorWorkerThread::new(channels, &config)?;
            worker.run()
        })
        .expect("Failed to spawn usb monitor thread")
}
