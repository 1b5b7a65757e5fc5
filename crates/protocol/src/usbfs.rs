//! usbfs ioctl request records
//!
//! The kernel reads `struct usbdevfs_ctrltransfer`, `usbdevfs_bulktransfer`
//! and `usbdevfs_ioctl` straight out of user memory. Each ends in a `void *`,
//! so the record size, the padding in front of that pointer and the ioctl
//! number (which encodes the size) all change with the host pointer width.
//! The records are packed here byte by byte instead of relying on `repr(C)`
//! padding, so both layouts can be built and checked on any host.
//!
//! ```text
//! ctrltransfer  Ptr32: type req value index length timeout data32         = 16
//!               Ptr64: type req value index length timeout [pad4] data64  = 24
//! bulktransfer  Ptr32: ep len timeout data32                               = 16
//!               Ptr64: ep len timeout [pad4] data64                        = 24
//! ioctl         Ptr32: ifno code data32                                    = 12
//!               Ptr64: ifno code data64                                    = 16
//! ```
//!
//! Fields are native-endian because the kernel copies them as plain C structs.

use crate::hid::ControlSetup;
use byteorder::{ByteOrder, NativeEndian};
use nix::sys::ioctl::ioctl_num_type;
use std::ffi::c_void;

/// ioctl type byte shared by every usbfs request
const USBDEVFS_MAGIC: u8 = b'U';

const NR_CONTROL: u8 = 0;
const NR_BULK: u8 = 2;
const NR_CLAIMINTERFACE: u8 = 15;
const NR_RELEASEINTERFACE: u8 = 16;
const NR_IOCTL: u8 = 18;
const NR_DISCONNECT: u8 = 22;
const NR_CONNECT: u8 = 23;

/// Largest record any layout produces
const MAX_RECORD_SIZE: usize = 24;

/// Which `struct` shape the running kernel expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestLayout {
    /// 32-bit data pointer, no padding
    Ptr32,
    /// 64-bit data pointer, aligned to 8 bytes
    Ptr64,
}

impl RequestLayout {
    /// The layout matching the pointer width this binary was built for
    pub const fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            Self::Ptr64
        } else {
            Self::Ptr32
        }
    }

    pub const fn control_size(self) -> usize {
        match self {
            Self::Ptr32 => 16,
            Self::Ptr64 => 24,
        }
    }

    pub const fn bulk_size(self) -> usize {
        match self {
            Self::Ptr32 => 16,
            Self::Ptr64 => 24,
        }
    }

    pub const fn ioctl_size(self) -> usize {
        match self {
            Self::Ptr32 => 12,
            Self::Ptr64 => 16,
        }
    }

    /// USBDEVFS_CONTROL
    pub fn control_code(self) -> ioctl_num_type {
        nix::request_code_readwrite!(USBDEVFS_MAGIC, NR_CONTROL, self.control_size())
    }

    /// USBDEVFS_BULK, also used for interrupt endpoints
    pub fn bulk_code(self) -> ioctl_num_type {
        nix::request_code_readwrite!(USBDEVFS_MAGIC, NR_BULK, self.bulk_size())
    }

    /// USBDEVFS_IOCTL, forwards a driver request to one interface
    pub fn ioctl_code(self) -> ioctl_num_type {
        nix::request_code_readwrite!(USBDEVFS_MAGIC, NR_IOCTL, self.ioctl_size())
    }

    fn write_pointer(self, buf: &mut [u8], offset: usize, data: usize) -> usize {
        match self {
            Self::Ptr32 => {
                NativeEndian::write_u32(&mut buf[offset..offset + 4], data as u32);
                offset + 4
            }
            Self::Ptr64 => {
                NativeEndian::write_u64(&mut buf[offset..offset + 8], data as u64);
                offset + 8
            }
        }
    }

    pub fn pack_control(self, transfer: &ControlTransfer) -> PackedRequest {
        let mut record = PackedRequest::new(self.control_code());
        let buf = &mut record.bytes.0;
        buf[0] = transfer.setup.request_type;
        buf[1] = transfer.setup.request;
        NativeEndian::write_u16(&mut buf[2..4], transfer.setup.value);
        NativeEndian::write_u16(&mut buf[4..6], transfer.setup.index);
        NativeEndian::write_u16(&mut buf[6..8], transfer.length);
        NativeEndian::write_u32(&mut buf[8..12], transfer.timeout_ms);
        let data_offset = match self {
            Self::Ptr32 => 12,
            Self::Ptr64 => 16,
        };
        record.len = self.write_pointer(buf, data_offset, transfer.data);
        record
    }

    pub fn pack_bulk(self, transfer: &BulkTransfer) -> PackedRequest {
        let mut record = PackedRequest::new(self.bulk_code());
        let buf = &mut record.bytes.0;
        NativeEndian::write_u32(&mut buf[0..4], transfer.endpoint);
        NativeEndian::write_u32(&mut buf[4..8], transfer.length);
        NativeEndian::write_u32(&mut buf[8..12], transfer.timeout_ms);
        let data_offset = match self {
            Self::Ptr32 => 12,
            Self::Ptr64 => 16,
        };
        record.len = self.write_pointer(buf, data_offset, transfer.data);
        record
    }

    pub fn pack_ioctl(self, request: &DriverIoctl) -> PackedRequest {
        let mut record = PackedRequest::new(self.ioctl_code());
        let buf = &mut record.bytes.0;
        NativeEndian::write_u32(&mut buf[0..4], request.interface);
        NativeEndian::write_u32(&mut buf[4..8], request.code);
        record.len = self.write_pointer(buf, 8, request.data);
        record
    }
}

/// USBDEVFS_CLAIMINTERFACE, argument is a pointer to the interface number
pub fn claim_interface_code() -> ioctl_num_type {
    nix::request_code_read!(USBDEVFS_MAGIC, NR_CLAIMINTERFACE, size_of::<u32>())
}

/// USBDEVFS_RELEASEINTERFACE, argument is a pointer to the interface number
pub fn release_interface_code() -> ioctl_num_type {
    nix::request_code_read!(USBDEVFS_MAGIC, NR_RELEASEINTERFACE, size_of::<u32>())
}

/// USBDEVFS_DISCONNECT, only valid inside a [`DriverIoctl`]
pub fn disconnect_code() -> u32 {
    nix::request_code_none!(USBDEVFS_MAGIC, NR_DISCONNECT) as u32
}

/// USBDEVFS_CONNECT, only valid inside a [`DriverIoctl`]
pub fn connect_code() -> u32 {
    nix::request_code_none!(USBDEVFS_MAGIC, NR_CONNECT) as u32
}

/// Layout-independent contents of a control transfer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTransfer {
    pub setup: ControlSetup,
    /// wLength, the size of the buffer at `data`
    pub length: u16,
    pub timeout_ms: u32,
    /// Address of the data stage buffer
    pub data: usize,
}

/// Layout-independent contents of a bulk or interrupt transfer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkTransfer {
    pub endpoint: u32,
    pub length: u32,
    pub timeout_ms: u32,
    pub data: usize,
}

/// A driver request (connect, disconnect) routed to one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverIoctl {
    pub interface: u32,
    pub code: u32,
    pub data: usize,
}

#[repr(C, align(8))]
#[derive(Clone, Copy)]
struct RecordBytes([u8; MAX_RECORD_SIZE]);

/// A request record packed for one layout, ready to hand to `ioctl(2)`
#[derive(Clone, Copy)]
pub struct PackedRequest {
    code: ioctl_num_type,
    bytes: RecordBytes,
    len: usize,
}

impl PackedRequest {
    fn new(code: ioctl_num_type) -> Self {
        Self {
            code,
            bytes: RecordBytes([0; MAX_RECORD_SIZE]),
            len: 0,
        }
    }

    /// The ioctl number matching this record's size
    pub fn code(&self) -> ioctl_num_type {
        self.code
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes.0[..self.len]
    }

    /// Pointer passed as the third `ioctl(2)` argument
    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.bytes.0.as_mut_ptr().cast()
    }
}

impl std::fmt::Debug for PackedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedRequest")
            .field("code", &format_args!("{:#x}", self.code))
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::{ControlSetup, ReportType};

    fn feature_transfer() -> ControlTransfer {
        ControlTransfer {
            setup: ControlSetup::get_report(ReportType::Feature, 0, 1),
            length: 256,
            timeout_ms: 1000,
            data: 0x1122_3344,
        }
    }

    #[test]
    fn test_host_layout_matches_pointer_width() {
        let expected = if size_of::<usize>() == 8 {
            RequestLayout::Ptr64
        } else {
            RequestLayout::Ptr32
        };
        assert_eq!(RequestLayout::host(), expected);
    }

    #[test]
    fn test_pack_control_ptr64() {
        let packed = RequestLayout::Ptr64.pack_control(&feature_transfer());
        let bytes = packed.as_bytes();
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[0], 0xa1);
        assert_eq!(bytes[1], 0x01);
        assert_eq!(&bytes[2..4], &0x0300u16.to_ne_bytes());
        assert_eq!(&bytes[4..6], &1u16.to_ne_bytes());
        assert_eq!(&bytes[6..8], &256u16.to_ne_bytes());
        assert_eq!(&bytes[8..12], &1000u32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
        assert_eq!(&bytes[16..24], &0x1122_3344u64.to_ne_bytes());
    }

    #[test]
    fn test_pack_control_ptr32() {
        let packed = RequestLayout::Ptr32.pack_control(&feature_transfer());
        let bytes = packed.as_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..12], &1000u32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &0x1122_3344u32.to_ne_bytes());
    }

    #[test]
    fn test_pack_bulk_layouts() {
        let transfer = BulkTransfer {
            endpoint: 0x81,
            length: 64,
            timeout_ms: 500,
            data: 0xdead_beef,
        };

        let wide = RequestLayout::Ptr64.pack_bulk(&transfer);
        assert_eq!(wide.as_bytes().len(), 24);
        assert_eq!(&wide.as_bytes()[0..4], &0x81u32.to_ne_bytes());
        assert_eq!(&wide.as_bytes()[4..8], &64u32.to_ne_bytes());
        assert_eq!(&wide.as_bytes()[12..16], &[0, 0, 0, 0]);
        assert_eq!(&wide.as_bytes()[16..24], &0xdead_beefu64.to_ne_bytes());

        let narrow = RequestLayout::Ptr32.pack_bulk(&transfer);
        assert_eq!(narrow.as_bytes().len(), 16);
        assert_eq!(&narrow.as_bytes()[12..16], &0xdead_beefu32.to_ne_bytes());
    }

    #[test]
    fn test_pack_ioctl_layouts() {
        let request = DriverIoctl {
            interface: 2,
            code: disconnect_code(),
            data: 0,
        };
        let wide = RequestLayout::Ptr64.pack_ioctl(&request);
        assert_eq!(wide.as_bytes().len(), 16);
        assert_eq!(&wide.as_bytes()[0..4], &2u32.to_ne_bytes());

        let narrow = RequestLayout::Ptr32.pack_ioctl(&request);
        assert_eq!(narrow.as_bytes().len(), 12);
    }

    #[test]
    fn test_record_is_aligned() {
        let mut packed = RequestLayout::host().pack_control(&feature_transfer());
        assert_eq!(packed.as_mut_ptr() as usize % 8, 0);
    }

    // Generic ioctl encoding: dir in bits 30..31, size in 16..29.
    #[cfg(any(
        target_arch = "x86_64",
        target_arch = "x86",
        target_arch = "aarch64",
        target_arch = "arm",
        target_arch = "riscv64"
    ))]
    mod generic_encoding {
        use super::*;

        #[test]
        fn test_ptr64_request_codes() {
            let layout = RequestLayout::Ptr64;
            assert_eq!(layout.control_code() as u32, 0xc018_5500);
            assert_eq!(layout.bulk_code() as u32, 0xc018_5502);
            assert_eq!(layout.ioctl_code() as u32, 0xc010_5512);
        }

        #[test]
        fn test_ptr32_request_codes() {
            let layout = RequestLayout::Ptr32;
            assert_eq!(layout.control_code() as u32, 0xc010_5500);
            assert_eq!(layout.bulk_code() as u32, 0xc010_5502);
            assert_eq!(layout.ioctl_code() as u32, 0xc00c_5512);
        }

        #[test]
        fn test_fixed_request_codes() {
            assert_eq!(claim_interface_code() as u32, 0x8004_550f);
            assert_eq!(release_interface_code() as u32, 0x8004_5510);
            assert_eq!(disconnect_code(), 0x5516);
            assert_eq!(connect_code(), 0x5517);
        }
    }
}
