//! Transport seam between device handles and the kernel
//!
//! A [`Backend`] opens a device node into a [`Transport`]; the transport
//! performs the individual usbfs operations. [`claim`] and [`release`] wrap
//! the driver hand-over around claiming an interface: failing to detach or
//! reattach the kernel driver is only logged, failing to claim or release the
//! interface is an error.

use protocol::ControlSetup;
use std::fmt;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Operations on one opened device node
///
/// All methods take `&self` so one thread can block in an interrupt read
/// while another issues control requests on the same handle.
pub trait Transport: Send + Sync {
    fn detach_kernel_driver(&self, interface: u8) -> io::Result<()>;

    fn attach_kernel_driver(&self, interface: u8) -> io::Result<()>;

    fn claim_interface(&self, interface: u8) -> io::Result<()>;

    fn release_interface(&self, interface: u8) -> io::Result<()>;

    /// Control transfer on endpoint zero; the direction comes from `setup`
    ///
    /// Returns the number of bytes moved in the data stage.
    fn control(&self, setup: ControlSetup, data: &mut [u8], timeout_ms: u32) -> io::Result<usize>;

    /// Interrupt transfer; the direction comes from bit 7 of `endpoint`
    fn interrupt(&self, endpoint: u8, data: &mut [u8], timeout_ms: u32) -> io::Result<usize>;
}

/// Opens device nodes
pub trait Backend: Send + Sync + fmt::Debug {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Transport>>;
}

/// Take `interface` away from its kernel driver and claim it
pub fn claim(transport: &dyn Transport, interface: u8) -> io::Result<()> {
    if let Err(e) = transport.detach_kernel_driver(interface) {
        warn!(
            "Failed to detach kernel driver from interface {}: {}",
            interface, e
        );
    }

    transport.claim_interface(interface)?;
    debug!("Claimed interface {}", interface);
    Ok(())
}

/// Release `interface` and hand it back to the kernel driver
pub fn release(transport: &dyn Transport, interface: u8) -> io::Result<()> {
    transport.release_interface(interface)?;
    debug!("Released interface {}", interface);

    if let Err(e) = transport.attach_kernel_driver(interface) {
        warn!(
            "Could not reattach kernel driver to interface {}: {}",
            interface, e
        );
    }
    Ok(())
}
