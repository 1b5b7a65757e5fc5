//! Wire-level definitions for usbfs-hid
//!
//! This crate defines the binary shapes the rest of the workspace speaks:
//! the USB descriptor records found in a device node, the HID class control
//! requests, and the usbfs ioctl request records whose layout depends on the
//! host pointer width. Nothing in here touches the kernel.
//!
//! # Example
//!
//! ```
//! use protocol::{DescriptorType, Descriptors, EndpointDescriptor};
//!
//! let stream = [0x07, 0x05, 0x81, 0x03, 0x40, 0x00, 0x0a];
//! let record = Descriptors::new(&stream).next().unwrap().unwrap();
//! assert_eq!(record.descriptor_type, DescriptorType::Endpoint);
//!
//! let endpoint = EndpointDescriptor::parse(record.body).unwrap();
//! assert!(endpoint.is_in());
//! assert_eq!(endpoint.max_packet_size, 64);
//! ```

pub mod descriptor;
pub mod error;
pub mod hid;
pub mod types;
pub mod usbfs;

pub use descriptor::{
    ConfigDescriptor, DescriptorType, Descriptors, DeviceDescriptor, EndpointDescriptor,
    HID_CLASS, HidDescriptor, InterfaceDescriptor, RawDescriptor, TransferKind,
};
pub use error::{ProtocolError, Result};
pub use hid::{ControlSetup, ReportType};
pub use types::HidInfo;
pub use usbfs::{BulkTransfer, ControlTransfer, DriverIoctl, PackedRequest, RequestLayout};
