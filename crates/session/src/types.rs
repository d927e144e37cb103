//! Session type definitions
//!
//! Types shared between the coordinator, the USB adapter, and the camera
//! driver: device identity, permission state, the control block resource,
//! and preview configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical identity of an attached USB device
///
/// Keyed by bus number and device address, the same way the host USB
/// subsystem reports hot-plug notifications. A key is only meaningful
/// while the device is attached; after a detach notification it must not
/// be used to reach hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    /// Bus number on the host
    pub bus: u8,
    /// Device address on the bus
    pub address: u8,
}

impl DeviceKey {
    pub fn new(bus: u8, address: u8) -> Self {
        Self { bus, address }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus {:03} addr {:03}", self.bus, self.address)
    }
}

/// Descriptor summary for an attached device
///
/// Enough information to decide whether the device is a camera candidate
/// and to present it in device listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Physical identity (bus, address)
    pub key: DeviceKey,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// USB device class
    pub class: u8,
    /// USB device subclass
    pub subclass: u8,
    /// Product string (if available)
    pub product: Option<String>,
}

/// Entry in a device listing, with the current permission probe outcome
#[derive(Debug, Clone)]
pub struct DeviceListing {
    pub info: DeviceInfo,
    pub permission: PermissionState,
}

/// Permission tri-state for one device
///
/// `Unrequested -> (request) -> Granted | Denied`, driven by an
/// asynchronous grant/deny delivery. There is no timeout: a request that
/// is never answered leaves the device `Unrequested` from the next
/// session's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Unrequested,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }
}

/// An opened, permission-validated channel to one device
///
/// Created by [`crate::UsbSubsystem::open_device`] only for a device whose
/// permission is granted. Deliberately neither `Clone` nor `Copy`: the
/// coordinator owns the single live block and gives it back to the
/// subsystem on release, so a second block cannot exist by construction.
#[derive(Debug, PartialEq, Eq)]
pub struct ControlBlock {
    device: DeviceKey,
    token: u32,
}

impl ControlBlock {
    pub fn new(device: DeviceKey, token: u32) -> Self {
        Self { device, token }
    }

    /// Device this block communicates with
    pub fn device(&self) -> DeviceKey {
        self.device
    }

    /// Subsystem-assigned token identifying the underlying open handle
    pub fn token(&self) -> u32 {
        self.token
    }
}

/// Opaque render target handle
///
/// Owned by the embedding UI layer; the coordinator only binds and
/// unbinds it and never touches the memory behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Preview pixel format mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFormat {
    #[default]
    Mjpeg,
    Yuv,
}

/// Preview geometry and format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Preview width in pixels
    #[serde(default = "PreviewConfig::default_width")]
    pub width: u32,
    /// Preview height in pixels
    #[serde(default = "PreviewConfig::default_height")]
    pub height: u32,
    /// Preview format mode
    #[serde(default)]
    pub format: PreviewFormat,
}

impl PreviewConfig {
    fn default_width() -> u32 {
        640
    }

    fn default_height() -> u32 {
        480
    }

    /// Width-to-height aspect ratio of the configured preview
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            format: PreviewFormat::default(),
        }
    }
}

/// Live binding between a decoded stream and a render surface
///
/// Exists only while its control block is open, and is always torn down
/// before the block is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSession {
    surface: SurfaceHandle,
    config: PreviewConfig,
}

impl PreviewSession {
    pub fn new(surface: SurfaceHandle, config: PreviewConfig) -> Self {
        Self { surface, config }
    }

    pub fn surface(&self) -> SurfaceHandle {
        self.surface
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }
}
