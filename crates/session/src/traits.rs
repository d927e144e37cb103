//! Trait seams for the two external collaborators
//!
//! The coordinator is constructed with injected implementations of these
//! traits, so it can be exercised without a UI host or real hardware. The
//! daemon provides a rusb-backed [`UsbSubsystem`]; the camera driver is an
//! external library behind [`CameraDriver`].

use crate::error::Result;
use crate::types::{ControlBlock, DeviceInfo, DeviceKey, PermissionState, PreviewSession};

/// Host USB subsystem: enumeration, permission negotiation, device opening
///
/// Permission results are not returned synchronously. `request_permission`
/// only starts the negotiation; the outcome arrives later as an event on
/// the coordinator's queue, from whichever delivery path the platform
/// uses. A request that is never answered must leave the subsystem inert.
pub trait UsbSubsystem {
    /// Subscribe to attach/detach notifications
    fn register(&mut self) -> Result<()>;

    /// Drop the attach/detach subscription and any permission receiver
    fn unregister(&mut self);

    /// Snapshot of currently attached camera-candidate devices
    fn list_attached(&self) -> Vec<DeviceInfo>;

    /// Whether the device can already be opened without a new request
    fn has_permission(&self, device: DeviceKey) -> bool;

    /// Current permission tri-state for the device
    ///
    /// Subsystems that can tell a refusal apart from a request that was
    /// never made should override this.
    fn permission_state(&self, device: DeviceKey) -> PermissionState {
        if self.has_permission(device) {
            PermissionState::Granted
        } else {
            PermissionState::Unrequested
        }
    }

    /// Start an asynchronous permission request for the device
    fn request_permission(&mut self, device: DeviceKey) -> Result<()>;

    /// Open a permission-granted device into a control block
    ///
    /// Callers must hold at most one block at a time; the block is given
    /// back through [`UsbSubsystem::close_device`].
    fn open_device(&mut self, device: DeviceKey) -> Result<ControlBlock>;

    /// Release an open control block
    fn close_device(&mut self, block: ControlBlock);
}

/// External camera driver: decodes the device stream and renders it
///
/// Errors from `open` and `start_preview` are driver-level and
/// recoverable; the caller releases the control block and returns to idle.
pub trait CameraDriver {
    /// Open the camera over a live control block
    fn open(&mut self, block: &ControlBlock) -> Result<()>;

    /// Bind the decoded output to the session's render surface
    fn start_preview(&mut self, session: &PreviewSession) -> Result<()>;

    /// Close the current camera session, keeping the driver reusable
    fn close(&mut self);

    /// Release all driver resources; the driver is done after this
    fn release(&mut self);
}
