//! Common utilities for usbfs-hid
//!
//! This crate provides the pieces shared by the transport and its tests:
//! the library error type, the diagnostic sink every component logs through,
//! and builders for synthetic descriptor streams.

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::{Diagnostics, diagnostic_sink, validate_filter};
