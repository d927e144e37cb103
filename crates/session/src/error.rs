//! Session error taxonomy
//!
//! Nothing here is fatal to the hosting process: every variant degrades to
//! "no active preview, awaiting the next attach". There are no automatic
//! retries; a new physical attach or explicit user action re-enters the
//! pipeline.

use crate::types::DeviceKey;
use thiserror::Error;

/// Session-level errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// User or host refused access to the device
    #[error("permission denied for device ({device})")]
    PermissionDenied { device: DeviceKey },

    /// Device detached or disconnected mid-session
    #[error("device lost ({device})")]
    DeviceLost { device: DeviceKey },

    /// Driver rejected an otherwise-permitted control block
    #[error("driver rejected control block: {reason}")]
    OpenFailure { reason: String },

    /// USB subsystem fault (enumeration, hot-plug registration)
    #[error("usb subsystem error: {0}")]
    Subsystem(String),
}

/// Type alias for session results
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::PermissionDenied {
            device: DeviceKey::new(1, 8),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("permission denied"));
        assert!(msg.contains("bus 001 addr 008"));
    }

    #[test]
    fn test_open_failure_display() {
        let err = SessionError::OpenFailure {
            reason: "unsupported format".to_string(),
        };
        assert!(format!("{}", err).contains("unsupported format"));
    }

    #[test]
    fn test_device_lost_display() {
        let err = SessionError::DeviceLost {
            device: DeviceKey::new(2, 3),
        };
        assert!(format!("{}", err).contains("device lost"));
    }
}
