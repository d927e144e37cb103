//! uvc-session daemon
//!
//! Hosts the device session coordinator together with its real adapters:
//! a rusb-backed USB monitor with hot-plug detection, a permission broker
//! delivering asynchronous grant/deny results, and a camera driver shim.
//! The binary in `main.rs` wires these up behind the channel bridge from
//! the `common` crate.

pub mod camera;
pub mod config;
pub mod coordinator;
pub mod usb;
