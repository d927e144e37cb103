//! rusb-backed USB subsystem
//!
//! Implements [`UsbSubsystem`] over a libusb context: enumeration of
//! camera candidates, hot-plug registration, permission probing, and
//! control block management. Hot-plug notifications are pushed onto the
//! shared session event queue; the coordinator never calls back into
//! libusb from another thread.

use crate::usb::permission;
use async_channel::Sender;
use common::SessionEvent;
use rusb::{Context, Device, HotplugBuilder, Registration, UsbContext};
use session::{ControlBlock, DeviceInfo, DeviceKey, PermissionState, SessionError, UsbSubsystem};
use std::collections::HashMap;
use tracing::{debug, warn};

/// USB device class code for video (UVC)
const CLASS_VIDEO: u8 = 0x0e;
/// Miscellaneous class used by composite UVC devices with an IAD
const CLASS_MISC: u8 = 0xef;

/// rusb-backed monitor and device opener
pub struct RusbMonitor {
    context: Context,
    filters: Vec<String>,
    event_tx: Sender<SessionEvent>,
    registration: Option<Registration<Context>>,
    /// Open device handles keyed by control block token
    handles: HashMap<u32, rusb::DeviceHandle<Context>>,
    next_token: u32,
}

impl RusbMonitor {
    /// Create a monitor over a fresh libusb context
    ///
    /// `filters` are VID:PID patterns; when empty, any video-class device
    /// is a candidate.
    pub fn new(event_tx: Sender<SessionEvent>, filters: Vec<String>) -> Result<Self, rusb::Error> {
        let context = Context::new()?;

        Ok(Self {
            context,
            filters,
            event_tx,
            registration: None,
            handles: HashMap::new(),
            next_token: 0,
        })
    }

    /// libusb context, for the monitor thread's event loop
    pub fn context(&self) -> &Context {
        &self.context
    }

    fn find_device(&self, key: DeviceKey) -> Option<Device<Context>> {
        self.context
            .devices()
            .ok()?
            .iter()
            .find(|d| d.bus_number() == key.bus && d.address() == key.address)
    }

    /// Whether the device should enter the session pipeline
    ///
    /// With filters configured, only VID:PID matches pass. Without
    /// filters, the device must look like a camera: video class at the
    /// device level, or a composite/interface-classed device exposing a
    /// video interface.
    fn is_camera_candidate(device: &Device<Context>, filters: &[String]) -> bool {
        let desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(_) => return false,
        };

        if !filters.is_empty() {
            return check_filter(desc.vendor_id(), desc.product_id(), filters);
        }

        match desc.class_code() {
            CLASS_VIDEO => true,
            CLASS_MISC | 0x00 => has_video_interface(device),
            _ => false,
        }
    }

    fn describe(device: &Device<Context>) -> Option<DeviceInfo> {
        let desc = device.device_descriptor().ok()?;

        // Product string is best effort; reading it needs a transient open
        let product = device.open().ok().and_then(|handle| {
            desc.product_string_index()
                .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok())
        });

        Some(DeviceInfo {
            key: DeviceKey::new(device.bus_number(), device.address()),
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            class: desc.class_code(),
            subclass: desc.sub_class_code(),
            product,
        })
    }
}

impl UsbSubsystem for RusbMonitor {
    fn register(&mut self) -> session::Result<()> {
        if self.registration.is_some() {
            return Ok(());
        }

        let callback = HotplugBridge {
            event_tx: self.event_tx.clone(),
            filters: self.filters.clone(),
        };

        let registration = HotplugBuilder::new()
            .enumerate(false) // the coordinator scans separately at start
            .register(&self.context, Box::new(callback))
            .map_err(|e| SessionError::Subsystem(format!("hot-plug registration failed: {e}")))?;

        self.registration = Some(registration);
        debug!("hot-plug callbacks registered");
        Ok(())
    }

    fn unregister(&mut self) {
        // Dropping the registration deregisters the callback; dropping
        // the handles closes any device still open.
        self.registration = None;
        self.handles.clear();
        debug!("hot-plug callbacks unregistered");
    }

    fn list_attached(&self) -> Vec<DeviceInfo> {
        let devices = match self.context.devices() {
            Ok(d) => d,
            Err(e) => {
                warn!("device enumeration failed: {}", e);
                return Vec::new();
            }
        };

        devices
            .iter()
            .filter(|d| Self::is_camera_candidate(d, &self.filters))
            .filter_map(|d| Self::describe(&d))
            .collect()
    }

    fn has_permission(&self, device: DeviceKey) -> bool {
        self.permission_state(device).is_granted()
    }

    fn permission_state(&self, device: DeviceKey) -> PermissionState {
        // On this host, permission means the device node can be opened
        let Some(dev) = self.find_device(device) else {
            return PermissionState::Unrequested;
        };

        match dev.open() {
            Ok(_) => PermissionState::Granted,
            Err(rusb::Error::Access) => PermissionState::Denied,
            Err(_) => PermissionState::Unrequested,
        }
    }

    fn request_permission(&mut self, device: DeviceKey) -> session::Result<()> {
        permission::spawn_permission_probe(self.context.clone(), device, self.event_tx.clone());
        Ok(())
    }

    fn open_device(&mut self, device: DeviceKey) -> session::Result<ControlBlock> {
        let dev = self
            .find_device(device)
            .ok_or(SessionError::DeviceLost { device })?;

        let handle = dev.open().map_err(|e| match e {
            rusb::Error::Access => SessionError::PermissionDenied { device },
            rusb::Error::NoDevice | rusb::Error::NotFound => SessionError::DeviceLost { device },
            other => SessionError::Subsystem(format!("open failed: {other}")),
        })?;

        self.next_token += 1;
        let token = self.next_token;
        self.handles.insert(token, handle);

        debug!(%device, token, "control block opened");
        Ok(ControlBlock::new(device, token))
    }

    fn close_device(&mut self, block: ControlBlock) {
        if self.handles.remove(&block.token()).is_some() {
            debug!(device = %block.device(), token = block.token(), "control block closed");
        }
    }
}

/// Check if a VID/PID pair is allowed by the filters
///
/// Filter format: "0xVID:0xPID", either side may be "*". Patterns are
/// validated by the config loader.
pub(crate) fn check_filter(vid: u16, pid: u16, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }

    for filter in filters {
        let parts: Vec<&str> = filter.split(':').collect();
        if parts.len() != 2 {
            continue;
        }

        let vid_match = parts[0] == "*"
            || u16::from_str_radix(parts[0].trim_start_matches("0x"), 16)
                .map(|v| v == vid)
                .unwrap_or(false);

        if !vid_match {
            continue;
        }

        let pid_match = parts[1] == "*"
            || u16::from_str_radix(parts[1].trim_start_matches("0x"), 16)
                .map(|p| p == pid)
                .unwrap_or(false);

        if pid_match {
            return true;
        }
    }

    false
}

/// Check the active configuration for a video-class interface
fn has_video_interface(device: &Device<Context>) -> bool {
    let config = match device.config_descriptor(0) {
        Ok(c) => c,
        Err(_) => return false,
    };

    config
        .interfaces()
        .flat_map(|i| i.descriptors())
        .any(|d| d.class_code() == CLASS_VIDEO)
}

/// Hot-plug callback bridging libusb notifications onto the event queue
struct HotplugBridge {
    event_tx: Sender<SessionEvent>,
    filters: Vec<String>,
}

impl rusb::Hotplug<Context> for HotplugBridge {
    fn device_arrived(&mut self, device: Device<Context>) {
        if !RusbMonitor::is_camera_candidate(&device, &self.filters) {
            debug!(
                "ignoring non-camera arrival (bus={}, addr={})",
                device.bus_number(),
                device.address()
            );
            return;
        }

        let Some(info) = RusbMonitor::describe(&device) else {
            warn!(
                "could not describe arrived device (bus={}, addr={})",
                device.bus_number(),
                device.address()
            );
            return;
        };

        if let Err(e) = self
            .event_tx
            .send_blocking(SessionEvent::Attached { device: info })
        {
            warn!("failed to deliver attach event: {}", e);
        }
    }

    fn device_left(&mut self, device: Device<Context>) {
        // Descriptor reads can fail for a device that is already gone, so
        // no candidate check here; the coordinator ignores unknown keys.
        let key = DeviceKey::new(device.bus_number(), device.address());

        if let Err(e) = self
            .event_tx
            .send_blocking(SessionEvent::Detached { device: key })
        {
            warn!("failed to deliver detach event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_logic() {
        let filters = vec![
            "0x046d:0x0825".to_string(), // Exact match
            "0x1234:*".to_string(),      // Wildcard PID
        ];

        assert!(check_filter(0x046d, 0x0825, &filters));
        assert!(check_filter(0x1234, 0x0001, &filters));
        assert!(check_filter(0x1234, 0xffff, &filters));

        assert!(!check_filter(0x046d, 0x9999, &filters));
        assert!(!check_filter(0x9999, 0x0825, &filters));

        // Empty filters = allow all
        assert!(check_filter(0x046d, 0x0825, &[]));
    }

    #[test]
    fn test_wildcard_vid_filter() {
        let filters = vec!["*:0x0825".to_string()];
        assert!(check_filter(0x046d, 0x0825, &filters));
        assert!(check_filter(0x0001, 0x0825, &filters));
        assert!(!check_filter(0x046d, 0x0826, &filters));
    }

    #[test]
    fn test_monitor_creation() {
        let (tx, _rx) = async_channel::bounded(4);

        // Context creation may fail without USB access; only assert on
        // the success path
        if let Ok(monitor) = RusbMonitor::new(tx, vec![]) {
            assert_eq!(monitor.next_token, 0);
            assert!(monitor.registration.is_none());
        }
    }
}
