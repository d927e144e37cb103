//! Integration tests for the device session coordinator
//!
//! Exercises the full attach/permission/open/preview lifecycle with
//! scripted collaborators, including:
//! - Single-block and idempotent-open guarantees
//! - Detach and disconnect recovery from every state
//! - Startup scans over multiple devices

use common::SessionEvent;
use common::test_utils::{CameraCall, RecordingCamera, ScriptedUsb, camera_info};
use daemon::coordinator::Coordinator;
use session::{DeviceInfo, PreviewConfig, SurfaceHandle};

fn coordinator() -> (
    Coordinator<ScriptedUsb, RecordingCamera>,
    ScriptedUsb,
    RecordingCamera,
) {
    let usb = ScriptedUsb::new();
    let camera = RecordingCamera::new();
    let coordinator = Coordinator::new(usb.clone(), camera.clone(), PreviewConfig::default());
    (coordinator, usb, camera)
}

fn attach(c: &mut Coordinator<ScriptedUsb, RecordingCamera>, usb: &ScriptedUsb, info: DeviceInfo) {
    usb.attach(info.clone());
    c.handle_event(SessionEvent::Attached { device: info });
}

mod full_lifecycle {
    use super::*;

    #[test]
    fn test_attach_request_grant_preview_detach() {
        let (mut c, usb, camera) = coordinator();
        let info = camera_info(1, 4);
        c.bind_surface(SurfaceHandle(1));

        // Attach with no permission: a request goes out, nothing opens
        attach(&mut c, &usb, info.clone());
        assert_eq!(usb.requests(), vec![info.key]);
        assert_eq!(c.state().name(), "awaiting-permission");
        assert_eq!(usb.open_count(), 0);

        // Grant arrives via the callback path
        usb.grant(info.key);
        c.handle_event(SessionEvent::PermissionResult {
            device: info.key,
            granted: true,
        });
        assert_eq!(c.state().name(), "previewing");
        assert_eq!(usb.open_count(), 1);
        assert_eq!(
            camera.calls(),
            vec![CameraCall::Open, CameraCall::StartPreview]
        );

        // Physical removal releases everything
        usb.detach(info.key);
        c.handle_event(SessionEvent::Detached { device: info.key });
        assert_eq!(c.state().name(), "idle");
        assert_eq!(usb.open_count(), 0);
        assert!(!camera.is_open());
    }

    #[test]
    fn test_pre_granted_attach_opens_directly() {
        let (mut c, usb, camera) = coordinator();
        let info = camera_info(1, 4);
        usb.grant(info.key);
        c.bind_surface(SurfaceHandle(1));

        attach(&mut c, &usb, info);

        assert!(usb.requests().is_empty());
        assert_eq!(c.state().name(), "previewing");
        assert_eq!(camera.open_calls(), 1);
    }

    #[test]
    fn test_grant_via_broadcast_path_equivalent_to_callback() {
        let (mut c, usb, _camera) = coordinator();
        let info = camera_info(1, 4);
        attach(&mut c, &usb, info.clone());

        // Broadcast-style delivery uses the exact same event variant
        usb.grant(info.key);
        c.handle_event(SessionEvent::PermissionResult {
            device: info.key,
            granted: true,
        });

        assert_eq!(c.state().open_device(), Some(info.key));
    }
}

mod single_block_invariant {
    use super::*;

    #[test]
    fn test_open_blocks_never_exceed_one() {
        let (mut c, usb, _camera) = coordinator();
        let a = camera_info(1, 4);
        let b = camera_info(1, 5);
        usb.grant(a.key);
        usb.grant(b.key);

        attach(&mut c, &usb, a.clone());
        attach(&mut c, &usb, b.clone());
        c.handle_event(SessionEvent::PermissionResult {
            device: b.key,
            granted: true,
        });

        usb.detach(a.key);
        c.handle_event(SessionEvent::Detached { device: a.key });
        attach(&mut c, &usb, b.clone());

        assert_eq!(usb.max_concurrent_open(), 1);
    }

    #[test]
    fn test_duplicate_grant_is_idempotent() {
        let (mut c, usb, camera) = coordinator();
        let info = camera_info(1, 4);
        attach(&mut c, &usb, info.clone());
        usb.grant(info.key);

        // Rapid duplicate deliveries of the same grant
        for _ in 0..3 {
            c.handle_event(SessionEvent::PermissionResult {
                device: info.key,
                granted: true,
            });
        }

        assert_eq!(usb.total_opens(), 1);
        assert_eq!(camera.open_calls(), 1);
    }
}

mod permission_refusal {
    use super::*;

    #[test]
    fn test_denied_never_calls_driver_open() {
        let (mut c, usb, camera) = coordinator();
        let info = camera_info(1, 4);
        attach(&mut c, &usb, info.clone());

        c.handle_event(SessionEvent::PermissionResult {
            device: info.key,
            granted: false,
        });

        assert_eq!(c.state().name(), "idle");
        assert_eq!(camera.open_calls(), 0);
    }

    #[test]
    fn test_cancelled_returns_to_idle_without_block() {
        let (mut c, usb, camera) = coordinator();
        let info = camera_info(1, 4);
        attach(&mut c, &usb, info.clone());

        c.handle_event(SessionEvent::PermissionCancelled { device: info.key });

        assert_eq!(c.state().name(), "idle");
        assert_eq!(usb.open_count(), 0);
        assert_eq!(camera.open_calls(), 0);
    }
}

mod detach_recovery {
    use super::*;

    #[test]
    fn test_detach_from_awaiting_permission() {
        let (mut c, usb, _camera) = coordinator();
        let info = camera_info(1, 4);
        attach(&mut c, &usb, info.clone());

        usb.detach(info.key);
        c.handle_event(SessionEvent::Detached { device: info.key });

        assert_eq!(c.state().name(), "idle");
        assert_eq!(usb.open_count(), 0);
    }

    #[test]
    fn test_detach_from_ready() {
        let (mut c, usb, _camera) = coordinator();
        let info = camera_info(1, 4);
        usb.grant(info.key);
        attach(&mut c, &usb, info.clone());
        assert_eq!(c.state().name(), "ready");

        usb.detach(info.key);
        c.handle_event(SessionEvent::Detached { device: info.key });

        assert_eq!(c.state().name(), "idle");
        assert_eq!(usb.open_count(), 0);
    }

    #[test]
    fn test_detach_from_previewing() {
        let (mut c, usb, camera) = coordinator();
        let info = camera_info(1, 4);
        usb.grant(info.key);
        c.bind_surface(SurfaceHandle(1));
        attach(&mut c, &usb, info.clone());
        assert_eq!(c.state().name(), "previewing");

        usb.detach(info.key);
        c.handle_event(SessionEvent::Detached { device: info.key });

        assert_eq!(c.state().name(), "idle");
        assert_eq!(usb.open_count(), 0);
        assert!(!camera.is_open());
    }

    #[test]
    fn test_disconnect_treated_like_detach_for_resources() {
        let (mut c, usb, camera) = coordinator();
        let info = camera_info(1, 4);
        usb.grant(info.key);
        c.bind_surface(SurfaceHandle(1));
        attach(&mut c, &usb, info.clone());

        c.handle_event(SessionEvent::Disconnected { device: info.key });

        assert_eq!(c.state().name(), "idle");
        assert_eq!(usb.open_count(), 0);
        assert!(!camera.is_open());
    }
}

mod startup_scan {
    use super::*;

    #[test]
    fn test_requests_permission_for_every_unpermitted_device() {
        let (mut c, usb, _camera) = coordinator();
        let first = camera_info(1, 4);
        let second = camera_info(2, 7);
        usb.attach(first.clone());
        usb.attach(second.clone());

        c.start().unwrap();

        let mut requests = usb.requests();
        requests.sort_by_key(|k| (k.bus, k.address));
        assert_eq!(requests, vec![first.key, second.key]);
    }

    #[test]
    fn test_skips_request_for_permitted_device() {
        let (mut c, usb, _camera) = coordinator();
        let permitted = camera_info(1, 4);
        let unpermitted = camera_info(2, 7);
        usb.attach(permitted.clone());
        usb.attach(unpermitted.clone());
        usb.grant(permitted.key);

        c.start().unwrap();

        assert_eq!(usb.requests(), vec![unpermitted.key]);
        assert_eq!(c.state().open_device(), Some(permitted.key));
    }

    #[test]
    fn test_never_requests_twice_for_same_device() {
        let (mut c, usb, _camera) = coordinator();
        let info = camera_info(1, 4);
        usb.attach(info.clone());

        c.start().unwrap();
        // Hot-plug notification for a device the scan already saw
        c.handle_event(SessionEvent::Attached {
            device: info.clone(),
        });

        assert_eq!(usb.requests(), vec![info.key]);
    }
}

mod lifecycle_hooks {
    use super::*;

    #[test]
    fn test_stop_releases_resources_but_stays_registered() {
        let (mut c, usb, _camera) = coordinator();
        let info = camera_info(1, 4);
        usb.attach(info.clone());
        usb.grant(info.key);
        c.start().unwrap();
        assert_eq!(usb.open_count(), 1);

        c.stop();

        assert_eq!(usb.open_count(), 0);
        assert!(usb.is_registered());
    }

    #[test]
    fn test_destroy_unregisters_and_releases_driver() {
        let (mut c, usb, camera) = coordinator();
        let info = camera_info(1, 4);
        usb.attach(info.clone());
        usb.grant(info.key);
        c.start().unwrap();

        c.destroy();

        assert_eq!(usb.open_count(), 0);
        assert!(!usb.is_registered());
        assert!(camera.calls().contains(&CameraCall::Release));
    }

    #[test]
    fn test_surface_release_closes_session() {
        let (mut c, usb, _camera) = coordinator();
        let info = camera_info(1, 4);
        usb.grant(info.key);
        c.bind_surface(SurfaceHandle(1));
        attach(&mut c, &usb, info.clone());
        assert_eq!(c.state().name(), "previewing");

        c.release_surface();

        assert_eq!(c.state().name(), "idle");
        assert_eq!(usb.open_count(), 0);

        // The permitted device reopens on the next start
        c.start().unwrap();
        assert_eq!(c.state().name(), "ready");
    }
}
