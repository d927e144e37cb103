//! Device session coordinator
//!
//! Tracks the lifecycle of one attached UVC camera from physical attach
//! through permission grant, control block acquisition, and live preview,
//! and back to idle on detach, disconnect, or stop.
//!
//! The coordinator is a single-owner state machine: it is driven
//! exclusively from the monitor thread's event loop, so every transition
//! is serialized even though events originate on independent threads
//! (hot-plug callback, permission broker). It holds at most one control
//! block at a time; the block's ownership moves in and out of
//! [`SessionState`], so a second concurrent block cannot exist.

use common::SessionEvent;
use session::{
    CameraDriver, ControlBlock, DeviceInfo, DeviceKey, PreviewConfig, PreviewSession, Result,
    SurfaceHandle, UsbSubsystem,
};
use std::collections::HashSet;
use std::mem;
use tracing::{debug, info, warn};

/// Coordinator states
///
/// `Idle -> AwaitingPermission -> Ready -> Previewing`, with `Ready` and
/// `Previewing` dropping straight back to `Idle` on detach or disconnect.
/// `Ready` holds an open block while no render surface is bound.
#[derive(Debug)]
pub enum SessionState {
    /// No device in flight
    Idle,
    /// Permission requested, result not yet delivered
    AwaitingPermission {
        /// Most recently requested device
        device: DeviceKey,
    },
    /// Control block open, camera opened, no surface bound yet
    Ready {
        /// The single open control block
        block: ControlBlock,
    },
    /// Decoded stream bound to a render surface
    Previewing {
        /// The single open control block
        block: ControlBlock,
        /// Binding to the render surface
        session: PreviewSession,
    },
}

impl SessionState {
    /// Device behind the open control block, if one exists
    pub fn open_device(&self) -> Option<DeviceKey> {
        match self {
            SessionState::Ready { block } | SessionState::Previewing { block, .. } => {
                Some(block.device())
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingPermission { .. } => "awaiting-permission",
            SessionState::Ready { .. } => "ready",
            SessionState::Previewing { .. } => "previewing",
        }
    }
}

/// Device session coordinator
///
/// Constructed with injected collaborators so it can run without a UI
/// host: a [`UsbSubsystem`] for enumeration and permission negotiation,
/// and a [`CameraDriver`] for the decode/render side.
pub struct Coordinator<U: UsbSubsystem, C: CameraDriver> {
    usb: U,
    driver: C,
    preview: PreviewConfig,
    surface: Option<SurfaceHandle>,
    state: SessionState,
    /// Devices with an outstanding permission request, so a request is
    /// never issued twice for the same device
    requested: HashSet<DeviceKey>,
}

impl<U: UsbSubsystem, C: CameraDriver> Coordinator<U, C> {
    pub fn new(usb: U, driver: C, preview: PreviewConfig) -> Self {
        Self {
            usb,
            driver,
            preview,
            surface: None,
            state: SessionState::Idle,
            requested: HashSet::new(),
        }
    }

    /// Subscribe to attach/detach notifications and scan attached devices
    ///
    /// Every currently-attached device goes through the same path as a
    /// fresh attach: permission is requested for each not-yet-permitted
    /// device, and a pre-granted one is opened directly. If a block is
    /// already open and a surface is bound, rendering resumes.
    pub fn start(&mut self) -> Result<()> {
        self.usb.register()?;

        let attached = self.usb.list_attached();
        info!(devices = attached.len(), "session coordinator started");
        for info in attached {
            self.handle_attach(info);
        }
        self.try_begin_preview();
        Ok(())
    }

    /// Close the active preview and control block, staying subscribed
    ///
    /// Outstanding permission requests survive a stop; their results are
    /// still accepted afterwards.
    pub fn stop(&mut self) {
        self.release_open_block();
    }

    /// Release everything and unsubscribe, including the permission receiver
    pub fn destroy(&mut self) {
        self.release_open_block();
        self.requested.clear();
        self.state = SessionState::Idle;
        self.usb.unregister();
        self.driver.release();
        info!("session coordinator destroyed");
    }

    /// Bind the UI-owned render surface; an open session starts previewing
    pub fn bind_surface(&mut self, surface: SurfaceHandle) {
        debug!(surface = surface.0, "render surface bound");
        self.surface = Some(surface);
        self.try_begin_preview();
    }

    /// Unbind the render surface, closing the active session
    pub fn release_surface(&mut self) {
        debug!("render surface released");
        self.surface = None;
        self.release_open_block();
    }

    /// Handle one session event; the caller serializes delivery
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Attached { device } => self.handle_attach(device),
            SessionEvent::Detached { device } => self.handle_detach(device),
            SessionEvent::PermissionResult { device, granted } => {
                self.handle_permission_result(device, granted)
            }
            SessionEvent::PermissionCancelled { device } => {
                info!(%device, "permission request dismissed without a decision");
                self.handle_permission_result(device, false);
            }
            SessionEvent::Disconnected { device } => self.handle_disconnect(device),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn usb(&self) -> &U {
        &self.usb
    }

    pub fn driver(&self) -> &C {
        &self.driver
    }

    fn handle_attach(&mut self, info: DeviceInfo) {
        let device = info.key;
        info!(
            %device,
            id = format_args!("{:04x}:{:04x}", info.vendor_id, info.product_id),
            product = info.product.as_deref().unwrap_or("unknown"),
            "usb device attached"
        );

        if let Some(open) = self.state.open_device() {
            debug!(%device, open = %open, "control block already open, ignoring attach");
            return;
        }

        if self.usb.has_permission(device) {
            self.open_session(device);
        } else if self.requested.insert(device) {
            match self.usb.request_permission(device) {
                Ok(()) => {
                    debug!(%device, "permission requested");
                    if matches!(self.state, SessionState::Idle) {
                        self.state = SessionState::AwaitingPermission { device };
                    }
                }
                Err(e) => {
                    warn!(%device, error = %e, "permission request failed");
                    self.requested.remove(&device);
                }
            }
        } else {
            debug!(%device, "permission already requested, not asking again");
        }
    }

    fn handle_permission_result(&mut self, device: DeviceKey, granted: bool) {
        self.requested.remove(&device);

        if !granted {
            info!(%device, "permission not granted");
            self.settle_waiting_state();
            return;
        }

        // Both delivery paths can report the same grant; opening must stay
        // idempotent.
        if let Some(open) = self.state.open_device() {
            if open == device {
                debug!(%device, "duplicate grant for already-open device, ignoring");
            } else {
                debug!(%device, open = %open, "another camera already open, ignoring grant");
            }
            return;
        }

        info!(%device, "permission granted");
        self.open_session(device);
    }

    fn handle_detach(&mut self, device: DeviceKey) {
        info!(%device, "usb device detached");
        self.requested.remove(&device);

        if self.state.open_device() == Some(device) {
            self.release_open_block();
        } else {
            self.settle_waiting_state();
        }
    }

    fn handle_disconnect(&mut self, device: DeviceKey) {
        warn!(%device, "camera disconnected");
        if self.state.open_device() == Some(device) {
            self.release_open_block();
        }
    }

    fn open_session(&mut self, device: DeviceKey) {
        if let Err(e) = self.try_open(device) {
            warn!(%device, error = %e, "failed to open camera session");
            self.settle_waiting_state();
        }
    }

    fn try_open(&mut self, device: DeviceKey) -> Result<()> {
        let block = self.usb.open_device(device)?;
        if let Err(e) = self.driver.open(&block) {
            self.usb.close_device(block);
            return Err(e);
        }

        info!(%device, "camera opened");
        self.state = SessionState::Ready { block };
        self.try_begin_preview();
        Ok(())
    }

    fn try_begin_preview(&mut self) {
        let Some(surface) = self.surface else {
            return;
        };

        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Ready { block } => {
                let session = PreviewSession::new(surface, self.preview.clone());
                match self.driver.start_preview(&session) {
                    Ok(()) => {
                        info!(
                            surface = surface.0,
                            width = self.preview.width,
                            height = self.preview.height,
                            "preview started"
                        );
                        self.state = SessionState::Previewing { block, session };
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to start preview");
                        self.driver.close();
                        self.usb.close_device(block);
                    }
                }
            }
            other => self.state = other,
        }
    }

    /// Tear down the preview session and control block, in that order
    fn release_open_block(&mut self) {
        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Ready { block } => {
                self.driver.close();
                self.usb.close_device(block);
                info!("camera session closed");
            }
            SessionState::Previewing { block, session } => {
                // The session must not outlive its block
                drop(session);
                self.driver.close();
                self.usb.close_device(block);
                info!("preview stopped, camera session closed");
            }
            other => self.state = other,
        }
    }

    /// After a deny, cancel, detach, or failed open: stay in
    /// `AwaitingPermission` while other requests are outstanding,
    /// otherwise fall back to `Idle`
    fn settle_waiting_state(&mut self) {
        if !matches!(self.state, SessionState::AwaitingPermission { .. }) {
            return;
        }
        self.state = match self.requested.iter().next() {
            Some(&device) => SessionState::AwaitingPermission { device },
            None => SessionState::Idle,
        };
    }
}
