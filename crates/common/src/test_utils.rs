//! Shared test fixtures
//!
//! Scripted implementations of the two trait seams. Both fakes are cheap
//! `Clone` handles over shared state, so a test can keep one handle for
//! scripting and inspection while the coordinator owns the other.

use session::{
    CameraDriver, ControlBlock, DeviceInfo, DeviceKey, PreviewSession, Result, SessionError,
    UsbSubsystem,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Build a camera-candidate `DeviceInfo` for tests
pub fn camera_info(bus: u8, address: u8) -> DeviceInfo {
    DeviceInfo {
        key: DeviceKey::new(bus, address),
        vendor_id: 0x046d,
        product_id: 0x0825,
        class: 0xef,
        subclass: 0x02,
        product: Some("Test UVC Camera".to_string()),
    }
}

#[derive(Default)]
struct ScriptedUsbState {
    attached: Vec<DeviceInfo>,
    permitted: HashSet<DeviceKey>,
    open_refused: HashSet<DeviceKey>,
    requests: Vec<DeviceKey>,
    open: Vec<DeviceKey>,
    max_concurrent_open: usize,
    total_opens: u32,
    next_token: u32,
    registered: bool,
}

/// Scripted USB subsystem
///
/// Permission outcomes are seeded up front with [`ScriptedUsb::grant`];
/// requests are recorded but never answered by the fake itself, matching
/// the asynchronous delivery of the real subsystem (the test injects the
/// resulting event into the coordinator directly).
#[derive(Clone, Default)]
pub struct ScriptedUsb {
    state: Arc<Mutex<ScriptedUsbState>>,
}

impl ScriptedUsb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a device visible to `list_attached`
    pub fn attach(&self, info: DeviceInfo) {
        self.state.lock().unwrap().attached.push(info);
    }

    /// Remove a device from the attached set
    pub fn detach(&self, device: DeviceKey) {
        self.state
            .lock()
            .unwrap()
            .attached
            .retain(|d| d.key != device);
    }

    /// Seed the device as already permitted
    pub fn grant(&self, device: DeviceKey) {
        self.state.lock().unwrap().permitted.insert(device);
    }

    /// Make `open_device` fail for the device even when permitted
    pub fn refuse_open(&self, device: DeviceKey) {
        self.state.lock().unwrap().open_refused.insert(device);
    }

    /// Permission requests issued so far, in order
    pub fn requests(&self) -> Vec<DeviceKey> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Number of control blocks currently open
    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    /// Highest number of blocks that were ever open at the same time
    pub fn max_concurrent_open(&self) -> usize {
        self.state.lock().unwrap().max_concurrent_open
    }

    /// Total number of successful `open_device` calls
    pub fn total_opens(&self) -> u32 {
        self.state.lock().unwrap().total_opens
    }

    pub fn is_registered(&self) -> bool {
        self.state.lock().unwrap().registered
    }
}

impl UsbSubsystem for ScriptedUsb {
    fn register(&mut self) -> Result<()> {
        self.state.lock().unwrap().registered = true;
        Ok(())
    }

    fn unregister(&mut self) {
        self.state.lock().unwrap().registered = false;
    }

    fn list_attached(&self) -> Vec<DeviceInfo> {
        self.state.lock().unwrap().attached.clone()
    }

    fn has_permission(&self, device: DeviceKey) -> bool {
        self.state.lock().unwrap().permitted.contains(&device)
    }

    fn request_permission(&mut self, device: DeviceKey) -> Result<()> {
        self.state.lock().unwrap().requests.push(device);
        Ok(())
    }

    fn open_device(&mut self, device: DeviceKey) -> Result<ControlBlock> {
        let mut state = self.state.lock().unwrap();

        if !state.permitted.contains(&device) {
            return Err(SessionError::PermissionDenied { device });
        }
        if !state.attached.iter().any(|d| d.key == device) {
            return Err(SessionError::DeviceLost { device });
        }
        if state.open_refused.contains(&device) {
            return Err(SessionError::Subsystem(format!(
                "scripted open refusal for {device}"
            )));
        }

        state.open.push(device);
        state.total_opens += 1;
        state.max_concurrent_open = state.max_concurrent_open.max(state.open.len());
        state.next_token += 1;
        Ok(ControlBlock::new(device, state.next_token))
    }

    fn close_device(&mut self, block: ControlBlock) {
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.open.iter().position(|d| *d == block.device()) {
            state.open.remove(pos);
        }
    }
}

/// Calls a [`RecordingCamera`] has observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraCall {
    Open,
    StartPreview,
    Close,
    Release,
}

#[derive(Default)]
struct RecordingCameraState {
    calls: Vec<CameraCall>,
    fail_open: bool,
    fail_preview: bool,
    open: bool,
}

/// Camera driver fake that records every call
#[derive(Clone, Default)]
pub struct RecordingCamera {
    state: Arc<Mutex<RecordingCameraState>>,
}

impl RecordingCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `open` to fail with a driver-level error
    pub fn fail_open(&self) {
        self.state.lock().unwrap().fail_open = true;
    }

    /// Script `start_preview` to fail with a driver-level error
    pub fn fail_preview(&self) {
        self.state.lock().unwrap().fail_preview = true;
    }

    pub fn calls(&self) -> Vec<CameraCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of `open` calls observed
    pub fn open_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == CameraCall::Open)
            .count()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }
}

impl CameraDriver for RecordingCamera {
    fn open(&mut self, _block: &ControlBlock) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(CameraCall::Open);
        if state.fail_open {
            return Err(SessionError::OpenFailure {
                reason: "scripted driver refusal".to_string(),
            });
        }
        state.open = true;
        Ok(())
    }

    fn start_preview(&mut self, _session: &PreviewSession) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(CameraCall::StartPreview);
        if !state.open {
            return Err(SessionError::OpenFailure {
                reason: "driver not open".to_string(),
            });
        }
        if state.fail_preview {
            return Err(SessionError::OpenFailure {
                reason: "scripted preview refusal".to_string(),
            });
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(CameraCall::Close);
        state.open = false;
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(CameraCall::Release);
        state.open = false;
    }
}
