//! USB descriptor records
//!
//! A usbfs device node reads back as the device descriptor followed by every
//! configuration descriptor the device reported, each of those followed by its
//! interface, class-specific and endpoint descriptors. The stream carries no
//! offsets: every record is `[bLength][bDescriptorType][payload]` and nesting
//! is implied by order alone.
//!
//! All multi-byte fields are little-endian as mandated by the USB 2.0
//! specification, chapter 9.

use crate::error::{ProtocolError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Interface class code for Human Interface Devices
pub const HID_CLASS: u8 = 0x03;

/// Descriptor type byte (bDescriptorType)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Device,
    Configuration,
    String,
    Interface,
    Endpoint,
    /// HID class descriptor, follows a HID interface descriptor
    Hid,
    /// HID report descriptor, only ever fetched with GET_DESCRIPTOR
    Report,
    Other(u8),
}

impl DescriptorType {
    pub const fn code(self) -> u8 {
        match self {
            Self::Device => 0x01,
            Self::Configuration => 0x02,
            Self::String => 0x03,
            Self::Interface => 0x04,
            Self::Endpoint => 0x05,
            Self::Hid => 0x21,
            Self::Report => 0x22,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for DescriptorType {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::Device,
            0x02 => Self::Configuration,
            0x03 => Self::String,
            0x04 => Self::Interface,
            0x05 => Self::Endpoint,
            0x21 => Self::Hid,
            0x22 => Self::Report,
            other => Self::Other(other),
        }
    }
}

/// One length-prefixed record sliced out of a descriptor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor<'a> {
    /// Byte offset of the record within the stream
    pub offset: usize,
    pub descriptor_type: DescriptorType,
    /// The whole record, header included
    pub body: &'a [u8],
}

/// Splits a raw descriptor stream into records
///
/// Yields at most one error; after a malformed record the iterator is fused
/// because nothing past it can be trusted.
#[derive(Debug, Clone)]
pub struct Descriptors<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Descriptors<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = Result<RawDescriptor<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }

        let offset = self.offset;
        let remaining = &self.bytes[offset..];
        let length = remaining[0] as usize;

        if length < 2 {
            self.failed = true;
            return Some(Err(ProtocolError::RecordTooShort { offset, length }));
        }
        if length > remaining.len() {
            self.failed = true;
            return Some(Err(ProtocolError::Truncated {
                offset,
                declared: length,
                remaining: remaining.len(),
            }));
        }

        let body = &remaining[..length];
        self.offset += length;
        Some(Ok(RawDescriptor {
            offset,
            descriptor_type: DescriptorType::from(body[1]),
            body,
        }))
    }
}

impl std::iter::FusedIterator for Descriptors<'_> {}

fn require(descriptor: &'static str, body: &[u8], needed: usize) -> Result<()> {
    if body.len() < needed {
        return Err(ProtocolError::DescriptorTooShort {
            descriptor,
            needed,
            actual: body.len(),
        });
    }
    Ok(())
}

/// Standard device descriptor (18 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// bcdUSB
    pub usb_version: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    /// Max packet size of endpoint zero
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    /// bcdDevice
    pub revision: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    pub const SIZE: usize = 18;

    pub fn parse(body: &[u8]) -> Result<Self> {
        require("Device", body, Self::SIZE)?;
        Ok(Self {
            usb_version: LittleEndian::read_u16(&body[2..4]),
            device_class: body[4],
            device_subclass: body[5],
            device_protocol: body[6],
            max_packet_size0: body[7],
            vendor_id: LittleEndian::read_u16(&body[8..10]),
            product_id: LittleEndian::read_u16(&body[10..12]),
            revision: LittleEndian::read_u16(&body[12..14]),
            manufacturer_index: body[14],
            product_index: body[15],
            serial_index: body[16],
            num_configurations: body[17],
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = Self::SIZE as u8;
        out[1] = DescriptorType::Device.code();
        LittleEndian::write_u16(&mut out[2..4], self.usb_version);
        out[4] = self.device_class;
        out[5] = self.device_subclass;
        out[6] = self.device_protocol;
        out[7] = self.max_packet_size0;
        LittleEndian::write_u16(&mut out[8..10], self.vendor_id);
        LittleEndian::write_u16(&mut out[10..12], self.product_id);
        LittleEndian::write_u16(&mut out[12..14], self.revision);
        out[14] = self.manufacturer_index;
        out[15] = self.product_index;
        out[16] = self.serial_index;
        out[17] = self.num_configurations;
        out
    }
}

/// Standard configuration descriptor (9 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigDescriptor {
    /// Length of this configuration including every nested descriptor
    pub total_length: u16,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub configuration_index: u8,
    pub attributes: u8,
    /// In 2 mA units
    pub max_power: u8,
}

impl ConfigDescriptor {
    pub const SIZE: usize = 9;

    pub fn parse(body: &[u8]) -> Result<Self> {
        require("Configuration", body, Self::SIZE)?;
        Ok(Self {
            total_length: LittleEndian::read_u16(&body[2..4]),
            num_interfaces: body[4],
            configuration_value: body[5],
            configuration_index: body[6],
            attributes: body[7],
            max_power: body[8],
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = Self::SIZE as u8;
        out[1] = DescriptorType::Configuration.code();
        LittleEndian::write_u16(&mut out[2..4], self.total_length);
        out[4] = self.num_interfaces;
        out[5] = self.configuration_value;
        out[6] = self.configuration_index;
        out[7] = self.attributes;
        out[8] = self.max_power;
        out
    }
}

/// Standard interface descriptor (9 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub interface_index: u8,
}

impl InterfaceDescriptor {
    pub const SIZE: usize = 9;

    pub fn parse(body: &[u8]) -> Result<Self> {
        require("Interface", body, Self::SIZE)?;
        Ok(Self {
            number: body[2],
            alternate_setting: body[3],
            num_endpoints: body[4],
            class: body[5],
            subclass: body[6],
            protocol: body[7],
            interface_index: body[8],
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            Self::SIZE as u8,
            DescriptorType::Interface.code(),
            self.number,
            self.alternate_setting,
            self.num_endpoints,
            self.class,
            self.subclass,
            self.protocol,
            self.interface_index,
        ]
    }

    pub fn is_hid(&self) -> bool {
        self.class == HID_CLASS
    }
}

/// Endpoint transfer type, bits 0..1 of bmAttributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// Standard endpoint descriptor (7 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Endpoint number with the direction in bit 7
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    pub const SIZE: usize = 7;

    pub fn parse(body: &[u8]) -> Result<Self> {
        require("Endpoint", body, Self::SIZE)?;
        Ok(Self {
            address: body[2],
            attributes: body[3],
            max_packet_size: LittleEndian::read_u16(&body[4..6]),
            interval: body[6],
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = Self::SIZE as u8;
        out[1] = DescriptorType::Endpoint.code();
        out[2] = self.address;
        out[3] = self.attributes;
        LittleEndian::write_u16(&mut out[4..6], self.max_packet_size);
        out[6] = self.interval;
        out
    }

    /// Device-to-host endpoint
    pub fn is_in(&self) -> bool {
        self.address & 0x80 != 0
    }

    pub fn number(&self) -> u8 {
        self.address & 0x0f
    }

    pub fn transfer_kind(&self) -> TransferKind {
        match self.attributes & 0x03 {
            0 => TransferKind::Control,
            1 => TransferKind::Isochronous,
            2 => TransferKind::Bulk,
            _ => TransferKind::Interrupt,
        }
    }
}

/// HID class descriptor (9 bytes with a single report descriptor entry)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HidDescriptor {
    /// bcdHID
    pub hid_version: u16,
    pub country_code: u8,
    pub num_descriptors: u8,
    pub report_descriptor_type: u8,
    pub report_descriptor_length: u16,
}

impl HidDescriptor {
    pub const SIZE: usize = 9;

    pub fn parse(body: &[u8]) -> Result<Self> {
        require("HID", body, Self::SIZE)?;
        Ok(Self {
            hid_version: LittleEndian::read_u16(&body[2..4]),
            country_code: body[4],
            num_descriptors: body[5],
            report_descriptor_type: body[6],
            report_descriptor_length: LittleEndian::read_u16(&body[7..9]),
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = Self::SIZE as u8;
        out[1] = DescriptorType::Hid.code();
        LittleEndian::write_u16(&mut out[2..4], self.hid_version);
        out[4] = self.country_code;
        out[5] = self.num_descriptors;
        out[6] = self.report_descriptor_type;
        LittleEndian::write_u16(&mut out[7..9], self.report_descriptor_length);
        out
    }
}
