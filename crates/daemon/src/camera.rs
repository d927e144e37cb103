//! Camera driver shim
//!
//! The UVC decode and render pipeline belongs to an external library; the
//! daemon only drives its lifecycle. [`TracingCamera`] stands on that
//! seam and logs every driver call, which lets the daemon run headless
//! while an embedding application substitutes a real renderer through the
//! same [`CameraDriver`] trait.

use session::{CameraDriver, ControlBlock, DeviceKey, PreviewSession, Result, SessionError};
use tracing::{debug, info};

/// Lifecycle-logging camera driver
#[derive(Debug, Default)]
pub struct TracingCamera {
    open_device: Option<DeviceKey>,
}

impl TracingCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open_device.is_some()
    }
}

impl CameraDriver for TracingCamera {
    fn open(&mut self, block: &ControlBlock) -> Result<()> {
        match self.open_device {
            Some(current) if current == block.device() => {
                debug!(device = %current, "camera already open");
                Ok(())
            }
            Some(current) => Err(SessionError::OpenFailure {
                reason: format!("driver busy with {current}"),
            }),
            None => {
                self.open_device = Some(block.device());
                info!(device = %block.device(), "camera driver opened");
                Ok(())
            }
        }
    }

    fn start_preview(&mut self, session: &PreviewSession) -> Result<()> {
        let Some(device) = self.open_device else {
            return Err(SessionError::OpenFailure {
                reason: "preview requested before driver open".to_string(),
            });
        };

        let config = session.config();
        info!(
            %device,
            surface = session.surface().0,
            width = config.width,
            height = config.height,
            format = ?config.format,
            "preview rendering started"
        );
        Ok(())
    }

    fn close(&mut self) {
        if let Some(device) = self.open_device.take() {
            info!(%device, "camera driver closed");
        }
    }

    fn release(&mut self) {
        self.close();
        debug!("camera driver released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session::{PreviewConfig, SurfaceHandle};

    #[test]
    fn test_preview_requires_open() {
        let mut camera = TracingCamera::new();
        let session = PreviewSession::new(SurfaceHandle(1), PreviewConfig::default());

        assert!(camera.start_preview(&session).is_err());
    }

    #[test]
    fn test_open_is_idempotent_per_device() {
        let mut camera = TracingCamera::new();
        let block = ControlBlock::new(DeviceKey::new(1, 4), 1);

        camera.open(&block).unwrap();
        camera.open(&block).unwrap();
        assert!(camera.is_open());
    }

    #[test]
    fn test_open_rejects_second_device() {
        let mut camera = TracingCamera::new();
        let first = ControlBlock::new(DeviceKey::new(1, 4), 1);
        let second = ControlBlock::new(DeviceKey::new(1, 5), 2);

        camera.open(&first).unwrap();
        let err = camera.open(&second).unwrap_err();
        assert!(matches!(err, SessionError::OpenFailure { .. }));
    }

    #[test]
    fn test_close_then_reopen() {
        let mut camera = TracingCamera::new();
        let block = ControlBlock::new(DeviceKey::new(1, 4), 1);

        camera.open(&block).unwrap();
        camera.close();
        assert!(!camera.is_open());

        let next = ControlBlock::new(DeviceKey::new(1, 5), 2);
        camera.open(&next).unwrap();
        assert!(camera.is_open());
    }
}
