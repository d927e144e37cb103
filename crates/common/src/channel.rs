//! Async channel bridge between the Tokio runtime and the monitor thread
//!
//! All session events, whether they originate in the hot-plug callback or
//! in the permission broker thread, land on one bounded queue consumed by
//! the coordinator. That single consumer is what serializes state
//! transitions: two grant deliveries for the same device cannot race an
//! open because they are handled one after the other.

use async_channel::{Receiver, Sender, bounded};
use session::{DeviceInfo, DeviceKey, DeviceListing, SurfaceHandle};

/// Commands from the Tokio runtime to the monitor thread
#[derive(Debug)]
pub enum MonitorCommand {
    /// List attached camera candidates with their permission state
    ListDevices {
        /// Channel to send response back
        response: tokio::sync::oneshot::Sender<Vec<DeviceListing>>,
    },

    /// Bind a render surface; promotes an open session to previewing
    BindSurface {
        /// UI-owned surface handle
        surface: SurfaceHandle,
    },

    /// Unbind the render surface; an active preview drops back to ready
    ReleaseSurface,

    /// Lifecycle stop: close preview and control block, stay subscribed
    Stop,

    /// Lifecycle start/resume: rescan devices and resume rendering
    Start,

    /// Shutdown the monitor thread gracefully
    Shutdown,
}

/// Session events converging on the coordinator queue
///
/// `PermissionResult` is the unified form of both delivery paths: the
/// direct probe callback and the broadcast-style broker thread both feed
/// this variant, so the coordinator has exactly one grant transition.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Device physically attached
    Attached {
        /// Descriptor summary of the new device
        device: DeviceInfo,
    },

    /// Device physically removed
    Detached {
        /// Identity of the removed device
        device: DeviceKey,
    },

    /// Permission negotiation finished
    PermissionResult {
        /// Device the result is for
        device: DeviceKey,
        /// Whether access was granted
        granted: bool,
    },

    /// Permission prompt dismissed without a decision
    PermissionCancelled {
        /// Device the request was for
        device: DeviceKey,
    },

    /// Driver reported I/O failure or abrupt loss of the open device
    Disconnected {
        /// Device behind the failed control block
        device: DeviceKey,
    },
}

/// Handle for the Tokio runtime (async side)
#[derive(Clone)]
pub struct SessionBridge {
    cmd_tx: Sender<MonitorCommand>,
}

impl SessionBridge {
    /// Send a command to the monitor thread
    pub async fn send_command(&self, cmd: MonitorCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for the monitor thread (blocking side)
///
/// Owns the command receiver and both ends of the event queue; the event
/// sender is cloned into the hot-plug callback and each permission probe.
pub struct MonitorChannels {
    pub(crate) cmd_rx: Receiver<MonitorCommand>,
    pub(crate) event_rx: Receiver<SessionEvent>,
    event_tx: Sender<SessionEvent>,
}

impl MonitorChannels {
    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<MonitorCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Try to receive a session event without blocking
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Clone the event sender for an event source (hot-plug callback,
    /// permission probe)
    pub fn event_sender(&self) -> Sender<SessionEvent> {
        self.event_tx.clone()
    }

    /// Send an event from the monitor thread itself (blocking)
    pub fn send_event(&self, event: SessionEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and the monitor thread
///
/// Returns (SessionBridge for Tokio, MonitorChannels for the monitor thread)
pub fn create_session_bridge() -> (SessionBridge, MonitorChannels) {
    let (cmd_tx, cmd_rx) = bounded(64);
    let (event_tx, event_rx) = bounded(64);

    (
        SessionBridge { cmd_tx },
        MonitorChannels {
            cmd_rx,
            event_rx,
            event_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_command_bridge() {
        let (bridge, channels) = create_session_bridge();

        let handle = std::thread::spawn(move || {
            loop {
                if let Some(cmd) = channels.try_recv_command() {
                    return matches!(cmd, MonitorCommand::Shutdown);
                }
                std::thread::yield_now();
            }
        });

        bridge.send_command(MonitorCommand::Shutdown).await.unwrap();
        assert!(handle.join().unwrap());
    }

    #[tokio::test]
    async fn test_events_from_two_sources_share_one_queue() {
        let (_bridge, channels) = create_session_bridge();

        let callback_tx = channels.event_sender();
        let broker_tx = channels.event_sender();
        let device = DeviceKey::new(1, 2);

        callback_tx
            .send_blocking(SessionEvent::Detached { device })
            .unwrap();
        broker_tx
            .send_blocking(SessionEvent::PermissionResult {
                device,
                granted: true,
            })
            .unwrap();

        let first = channels.try_recv_event().unwrap();
        let second = channels.try_recv_event().unwrap();
        assert!(matches!(first, SessionEvent::Detached { .. }));
        assert!(matches!(second, SessionEvent::PermissionResult { .. }));
        assert!(channels.try_recv_event().is_none());
    }
}
