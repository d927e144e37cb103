//! Device session domain types
//!
//! This crate defines the platform-independent vocabulary of a UVC camera
//! session: device identity, permission state, the control block resource,
//! preview configuration, the session error taxonomy, and the trait seams
//! for the two external collaborators (USB subsystem and camera driver).
//!
//! Nothing in here touches hardware; the daemon crate supplies the real
//! adapters and the common crate supplies scripted fakes for tests.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, SessionError};
pub use traits::{CameraDriver, UsbSubsystem};
pub use types::{
    ControlBlock, DeviceInfo, DeviceKey, DeviceListing, PermissionState, PreviewConfig,
    PreviewFormat, PreviewSession, SurfaceHandle,
};
