//! USB subsystem adapters
//!
//! Real implementations of the host-side collaborators:
//! - Hot-plug monitoring and device enumeration over rusb
//! - Permission brokering with asynchronous result delivery
//! - The dedicated monitor thread that serializes coordinator events
//!
//! Everything here runs on (or is spawned from) the blocking monitor
//! thread; the Tokio runtime only talks to it through the channel bridge.

pub mod monitor;
pub mod permission;
pub mod worker;

pub use monitor::RusbMonitor;
pub use worker::{MonitorWorkerThread, spawn_monitor_worker};
