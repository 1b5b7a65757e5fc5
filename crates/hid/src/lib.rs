//! Linux usbfs transport for USB HID interfaces
//!
//! Devices are discovered by parsing the descriptor stream of every node under
//! `/dev/bus/usb` and driven with raw control and interrupt transfers issued
//! through usbfs ioctls; no USB client library is involved.
//!
//! # Example
//!
//! ```no_run
//! use hid::{Device, Enumerator, HidConfig};
//! use std::time::Duration;
//!
//! let enumerator = Enumerator::new(HidConfig::load_or_default())?;
//! if let Some(mut device) = enumerator.find(|d| d.info().vendor_id == 0x16c0) {
//!     device.open()?;
//!     device.write(&[0x01, 0x02], Duration::from_millis(100))?;
//!     let reply = device.read(None, Duration::from_millis(500))?;
//!     println!("{}: {:02x?}", device.info(), reply);
//! }
//! # Ok::<(), common::Error>(())
//! ```

pub mod config;
pub mod device;
pub mod enumerate;
pub mod transport;
pub mod usbfs;
pub mod walker;

pub use common::{Diagnostics, Error, Result};
pub use config::{HidConfig, load_config};
pub use device::{Device, DeviceContext, Endpoint, HidDevice, REPORT_DESCRIPTOR_SIZE, ReportOptions};
pub use enumerate::{Enumerator, NodeFailure, ScanReport, enumerate};
pub use protocol::{ControlSetup, HidInfo, ReportType};
pub use transport::{Backend, Transport};
pub use usbfs::UsbfsBackend;
pub use walker::{DescriptorWalker, WalkState};
