//! usbfs backend
//!
//! Talks to `/dev/bus/usb/BBB/DDD` nodes with `ioctl(2)`. Every request record
//! is packed by [`protocol::usbfs`] in the layout of the host pointer width;
//! the kernel reads the data pointer at that width, so no other layout is
//! ever submitted.

use crate::transport::{Backend, Transport};
use nix::errno::Errno;
use nix::libc;
use nix::sys::ioctl::ioctl_num_type;
use protocol::usbfs::{self, BulkTransfer, ControlTransfer, DriverIoctl, PackedRequest};
use protocol::{ControlSetup, RequestLayout};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;
use tracing::debug;

/// Opens device nodes read-write for usbfs requests
#[derive(Debug, Clone, Copy, Default)]
pub struct UsbfsBackend;

impl UsbfsBackend {
    pub fn new() -> Self {
        Self
    }

    /// Request layout used for every transfer
    pub fn layout(&self) -> RequestLayout {
        RequestLayout::host()
    }
}

impl Backend for UsbfsBackend {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Transport>> {
        let transport = UsbfsTransport::open(path)?;
        Ok(Box::new(transport))
    }
}

/// An opened usbfs device node
#[derive(Debug)]
pub struct UsbfsTransport {
    file: File,
    layout: RequestLayout,
}

impl UsbfsTransport {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let layout = RequestLayout::host();
        debug!("Opened {} ({:?} request layout)", path.display(), layout);
        Ok(Self { file, layout })
    }

    pub fn layout(&self) -> RequestLayout {
        self.layout
    }

    fn ioctl(&self, code: ioctl_num_type, arg: *mut libc::c_void) -> io::Result<usize> {
        // SAFETY: `arg` points at a live, initialised argument whose size is the
        // one encoded in `code`; every buffer the argument refers to is borrowed
        // by the caller for the whole call.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), code, arg) };
        Errno::result(rc)
            .map(|n| n as usize)
            .map_err(io::Error::from)
    }

    fn submit(&self, mut request: PackedRequest) -> io::Result<usize> {
        self.ioctl(request.code(), request.as_mut_ptr())
    }

    fn interface_ioctl(&self, code: ioctl_num_type, interface: u8) -> io::Result<()> {
        let mut number = u32::from(interface);
        self.ioctl(code, (&raw mut number).cast())?;
        Ok(())
    }

    fn driver_ioctl(&self, interface: u8, code: u32) -> io::Result<()> {
        let request = self.layout.pack_ioctl(&DriverIoctl {
            interface: u32::from(interface),
            code,
            data: 0,
        });
        self.submit(request)?;
        Ok(())
    }
}

impl Transport for UsbfsTransport {
    fn detach_kernel_driver(&self, interface: u8) -> io::Result<()> {
        self.driver_ioctl(interface, usbfs::disconnect_code())
    }

    fn attach_kernel_driver(&self, interface: u8) -> io::Result<()> {
        self.driver_ioctl(interface, usbfs::connect_code())
    }

    fn claim_interface(&self, interface: u8) -> io::Result<()> {
        self.interface_ioctl(usbfs::claim_interface_code(), interface)
    }

    fn release_interface(&self, interface: u8) -> io::Result<()> {
        self.interface_ioctl(usbfs::release_interface_code(), interface)
    }

    fn control(&self, setup: ControlSetup, data: &mut [u8], timeout_ms: u32) -> io::Result<usize> {
        let length = u16::try_from(data.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("control transfer of {} bytes exceeds wLength", data.len()),
            )
        })?;

        let request = self.layout.pack_control(&ControlTransfer {
            setup,
            length,
            timeout_ms,
            data: data.as_mut_ptr() as usize,
        });
        self.submit(request)
    }

    fn interrupt(&self, endpoint: u8, data: &mut [u8], timeout_ms: u32) -> io::Result<usize> {
        let length = u32::try_from(data.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("interrupt transfer of {} bytes is too large", data.len()),
            )
        })?;

        let request = self.layout.pack_bulk(&BulkTransfer {
            endpoint: u32::from(endpoint),
            length,
            timeout_ms,
            data: data.as_mut_ptr() as usize,
        });
        self.submit(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_uses_host_layout() {
        assert_eq!(UsbfsBackend::default().layout(), RequestLayout::host());
    }

    #[test]
    fn test_transport_packs_full_width_pointers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("002");
        std::fs::write(&path, [0u8; 18]).unwrap();

        let transport = UsbfsTransport::open(&path).unwrap();
        assert_eq!(transport.layout(), RequestLayout::host());
        assert_eq!(
            transport.layout().control_size(),
            if cfg!(target_pointer_width = "64") { 24 } else { 16 }
        );
    }

    #[test]
    fn test_open_missing_node() {
        let backend = UsbfsBackend::default();
        let err = backend
            .open(Path::new("/nonexistent/bus/usb/001/001"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_ioctl_on_regular_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("001");
        std::fs::write(&path, [0u8; 18]).unwrap();

        let transport = UsbfsTransport::open(&path).unwrap();
        let err = transport.claim_interface(0).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
    }
}
