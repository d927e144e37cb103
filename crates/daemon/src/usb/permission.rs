//! Permission broker
//!
//! On a desktop host there is no permission dialog: access to a device is
//! decided by whether its node can be opened. The broker probes that on
//! its own thread and delivers the outcome through the same event queue
//! as hot-plug notifications, so grants arriving from this path and from
//! a direct pre-check converge on one coordinator transition.
//!
//! A probe that never finishes leaves the coordinator parked in its
//! awaiting state holding nothing, which is the required behavior for an
//! unanswered permission prompt.

use async_channel::Sender;
use common::SessionEvent;
use rusb::{Context, UsbContext};
use session::DeviceKey;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Probe whether `device` can be opened and report the result asynchronously
///
/// Delivers `PermissionResult { granted }` on a decision, or
/// `PermissionCancelled` when the device vanished before one was reached.
pub fn spawn_permission_probe(
    context: Context,
    device: DeviceKey,
    event_tx: Sender<SessionEvent>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("permission-probe".to_string())
        .spawn(move || {
            let event = match probe(&context, device) {
                Some(granted) => {
                    debug!(%device, granted, "permission probe finished");
                    SessionEvent::PermissionResult { device, granted }
                }
                None => {
                    debug!(%device, "device gone before permission decision");
                    SessionEvent::PermissionCancelled { device }
                }
            };

            if let Err(e) = event_tx.send_blocking(event) {
                warn!(%device, "failed to deliver permission result: {}", e);
            }
        })
        .expect("Failed to spawn permission probe thread")
}

/// `Some(granted)` on a decision, `None` if the device is already gone
fn probe(context: &Context, device: DeviceKey) -> Option<bool> {
    let dev = context
        .devices()
        .ok()?
        .iter()
        .find(|d| d.bus_number() == device.bus && d.address() == device.address)?;

    match dev.open() {
        Ok(handle) => {
            drop(handle);
            Some(true)
        }
        Err(rusb::Error::NoDevice) | Err(rusb::Error::NotFound) => None,
        Err(e) => {
            debug!(%device, "permission probe open failed: {}", e);
            Some(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_for_absent_device_reports_cancelled() {
        let Ok(context) = Context::new() else {
            // No USB access in this environment
            return;
        };

        let (tx, rx) = async_channel::bounded(1);
        // Address 0 is never assigned to a device
        let device = DeviceKey::new(255, 0);

        let handle = spawn_permission_probe(context, device, tx);
        handle.join().unwrap();

        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event,
            SessionEvent::PermissionCancelled { device: d } if d == device
        ));
    }
}
