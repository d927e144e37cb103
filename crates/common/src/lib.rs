//! Common utilities for uvc-session
//!
//! This crate provides shared infrastructure between the daemon and its
//! tests: error handling, logging setup, the async channel bridge that
//! serializes events from the USB monitor and permission broker into one
//! coordinator queue, and scripted fakes for the trait seams.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{
    MonitorChannels, MonitorCommand, SessionBridge, SessionEvent, create_session_bridge,
};
pub use error::{Error, Result};
pub use logging::setup_logging;
