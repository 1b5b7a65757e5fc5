//! Test utilities for usbfs-hid
//!
//! Builders for synthetic descriptor streams and a log capture writer, used by
//! the unit and integration tests of every crate.
//!
//! # Example
//!
//! ```
//! use common::test_utils::DescriptorStream;
//!
//! let bytes = DescriptorStream::new()
//!     .device(0x16c0, 0x05df, 0x0100)
//!     .config()
//!     .hid_interface(0)
//!     .endpoint(0x81, 8)
//!     .build();
//! assert_eq!(bytes[0], 18);
//! assert_eq!(bytes.len(), 18 + 9 + 9 + 9 + 7);
//! ```

use protocol::{
    ConfigDescriptor, DeviceDescriptor, EndpointDescriptor, HID_CLASS, HidDescriptor,
    InterfaceDescriptor,
};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Interrupt transfer type in bmAttributes
const INTERRUPT: u8 = 0x03;

/// Builder for a raw descriptor stream as read from a usbfs device node
#[derive(Debug, Clone, Default)]
pub struct DescriptorStream {
    bytes: Vec<u8>,
}

impl DescriptorStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(self, vendor_id: u16, product_id: u16, revision: u16) -> Self {
        let descriptor = DeviceDescriptor {
            usb_version: 0x0200,
            max_packet_size0: 64,
            vendor_id,
            product_id,
            revision,
            num_configurations: 1,
            ..Default::default()
        };
        self.raw(&descriptor.encode())
    }

    pub fn config(self) -> Self {
        let descriptor = ConfigDescriptor {
            configuration_value: 1,
            attributes: 0x80,
            max_power: 50,
            ..Default::default()
        };
        self.raw(&descriptor.encode())
    }

    pub fn interface(self, number: u8, class: u8, subclass: u8, protocol: u8) -> Self {
        let descriptor = InterfaceDescriptor {
            number,
            num_endpoints: 2,
            class,
            subclass,
            protocol,
            ..Default::default()
        };
        self.raw(&descriptor.encode())
    }

    /// A HID interface followed by its HID class descriptor
    pub fn hid_interface(self, number: u8) -> Self {
        self.interface(number, HID_CLASS, 0, 0).hid_class(64)
    }

    pub fn hid_class(self, report_descriptor_length: u16) -> Self {
        let descriptor = HidDescriptor {
            hid_version: 0x0111,
            num_descriptors: 1,
            report_descriptor_type: 0x22,
            report_descriptor_length,
            ..Default::default()
        };
        self.raw(&descriptor.encode())
    }

    /// An interrupt endpoint
    pub fn endpoint(self, address: u8, max_packet_size: u16) -> Self {
        let descriptor = EndpointDescriptor {
            address,
            attributes: INTERRUPT,
            max_packet_size,
            interval: 10,
        };
        self.raw(&descriptor.encode())
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// In-memory log writer for asserting on diagnostics
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
