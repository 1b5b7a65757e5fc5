//! HID device handle
//!
//! A [`HidDevice`] is one HID interface of one USB device node. Handles are
//! produced closed by the descriptor walker; [`Device::open`] acquires the node
//! and claims the interface, [`Device::close`] (or dropping the handle) gives
//! it back to the kernel driver.

use crate::config::HidConfig;
use crate::transport::{self, Backend, Transport};
use crate::usbfs::UsbfsBackend;
use common::{Diagnostics, Error, Result};
use protocol::{ControlSetup, EndpointDescriptor, HidInfo, ReportType};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Receive buffer for the report descriptor request
pub const REPORT_DESCRIPTOR_SIZE: usize = 256;

/// An interrupt endpoint retained for an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: u8,
    pub max_packet_size: u16,
}

impl From<&EndpointDescriptor> for Endpoint {
    fn from(descriptor: &EndpointDescriptor) -> Self {
        Self {
            address: descriptor.address,
            max_packet_size: descriptor.max_packet_size,
        }
    }
}

/// Per-call options for [`Device::get_report`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Receive buffer size; the configured default when `None`
    pub buffer_size: Option<usize>,
}

impl ReportOptions {
    pub fn with_buffer_size(size: usize) -> Self {
        Self {
            buffer_size: Some(size),
        }
    }
}

/// Everything a handle shares with the enumeration that produced it
#[derive(Debug, Clone)]
pub struct DeviceContext {
    backend: Arc<dyn Backend>,
    diagnostics: Diagnostics,
    report_buffer_size: usize,
    control_timeout: Duration,
}

impl DeviceContext {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let defaults = HidConfig::default();
        Self {
            backend,
            diagnostics: Diagnostics::default(),
            report_buffer_size: defaults.report_buffer_size,
            control_timeout: defaults.control_timeout(),
        }
    }

    /// Context for the real usbfs backend with the sizes and timeouts of `config`
    pub fn from_config(config: &HidConfig) -> Self {
        Self::new(Arc::new(UsbfsBackend::default())).with_config(config)
    }

    pub fn with_config(mut self, config: &HidConfig) -> Self {
        self.report_buffer_size = config.report_buffer_size;
        self.control_timeout = config.control_timeout();
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn report_buffer_size(&self) -> usize {
        self.report_buffer_size
    }

    pub fn control_timeout(&self) -> Duration {
        self.control_timeout
    }
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self::new(Arc::new(UsbfsBackend::default()))
    }
}

/// The HID-level operations on one interface
pub trait Device {
    /// Open the device node and claim the interface
    fn open(&mut self) -> Result<()>;

    /// Release the interface and close the node; a no-op when closed
    fn close(&mut self);

    fn info(&self) -> HidInfo;

    /// Fetch the HID report descriptor into a [`REPORT_DESCRIPTOR_SIZE`] buffer
    fn hid_report(&self) -> Result<Vec<u8>>;

    /// GET_REPORT for a feature report
    fn get_report(&self, report_id: u8, options: ReportOptions) -> Result<Vec<u8>>;

    /// SET_REPORT for a feature report
    fn set_report(&self, report_id: u8, data: &[u8]) -> Result<()>;

    /// Interrupt IN transfer of up to `size` bytes, or one max-size packet
    fn read(&self, size: Option<usize>, timeout: Duration) -> Result<Vec<u8>>;

    /// Interrupt OUT transfer, or an output report over the control pipe when
    /// the interface has no OUT endpoint
    fn write(&self, data: &[u8], timeout: Duration) -> Result<usize>;
}

/// One HID interface of a USB device node
pub struct HidDevice {
    info: HidInfo,
    path: PathBuf,
    input: Option<Endpoint>,
    output: Option<Endpoint>,
    transport: Option<Box<dyn Transport>>,
    context: DeviceContext,
}

impl HidDevice {
    pub fn new(
        info: HidInfo,
        path: impl Into<PathBuf>,
        input: Option<Endpoint>,
        output: Option<Endpoint>,
        context: DeviceContext,
    ) -> Self {
        Self {
            info,
            path: path.into(),
            input,
            output,
            transport: None,
            context,
        }
    }

    /// The device node backing this interface
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn input_endpoint(&self) -> Option<Endpoint> {
        self.input
    }

    pub fn output_endpoint(&self) -> Option<Endpoint> {
        self.output
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Issue an arbitrary control transfer on endpoint zero
    ///
    /// `data` is filled for IN requests and sent for OUT requests. Returns the
    /// length of the data stage.
    pub fn control(&self, setup: ControlSetup, data: &mut [u8], timeout: Duration) -> Result<usize> {
        self.context
            .diagnostics
            .in_scope(|| self.control_transfer(setup, data, timeout))
    }

    fn transport(&self) -> Result<&dyn Transport> {
        self.transport.as_deref().ok_or(Error::NotOpen)
    }

    fn control_transfer(
        &self,
        setup: ControlSetup,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        let transport = self.transport()?;
        let direction = if setup.is_in() { "IN" } else { "OUT" };

        debug!(
            "Control {} on {}: type=0x{:02x} request=0x{:02x} value=0x{:04x} index={} len={}",
            direction,
            self.info,
            setup.request_type,
            setup.request,
            setup.value,
            setup.index,
            data.len()
        );

        let transferred = transport.control(setup, data, millis(timeout))?;
        debug!("Control {} on {}: {} bytes", direction, self.info, transferred);
        Ok(transferred)
    }

    fn control_in(&self, setup: ControlSetup, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let received = self.control_transfer(setup, &mut buffer, self.context.control_timeout)?;
        buffer.truncate(received);
        Ok(buffer)
    }

    fn open_node(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Err(Error::AlreadyOpen);
        }

        let transport = self.context.backend.open(&self.path)?;
        transport::claim(transport.as_ref(), self.info.interface)?;
        debug!("Opened {} at {}", self.info, self.path.display());

        self.transport = Some(transport);
        Ok(())
    }

    fn read_input(&self, size: Option<usize>, timeout: Duration) -> Result<Vec<u8>> {
        let transport = self.transport()?;
        let endpoint = self.input.ok_or(Error::MissingEndpoint {
            interface: self.info.interface,
            direction: "IN",
        })?;

        let mut buffer = vec![0u8; size.unwrap_or(usize::from(endpoint.max_packet_size))];
        let received = transport.interrupt(endpoint.address, &mut buffer, millis(timeout))?;
        debug!(
            "Interrupt IN 0x{:02x} on {}: {} bytes",
            endpoint.address, self.info, received
        );

        buffer.truncate(received);
        Ok(buffer)
    }

    fn write_output(&self, data: &[u8], timeout: Duration) -> Result<usize> {
        let transport = self.transport()?;
        let mut buffer = data.to_vec();

        match self.output {
            Some(endpoint) => {
                let sent = transport.interrupt(endpoint.address, &mut buffer, millis(timeout))?;
                debug!(
                    "Interrupt OUT 0x{:02x} on {}: {} bytes",
                    endpoint.address, self.info, sent
                );
                Ok(sent)
            }
            None => {
                let setup = ControlSetup::set_report(ReportType::Output, 0, self.info.interface);
                self.control_transfer(setup, &mut buffer, timeout)
            }
        }
    }
}

impl Device for HidDevice {
    fn open(&mut self) -> Result<()> {
        let diagnostics = self.context.diagnostics.clone();
        diagnostics.in_scope(|| self.open_node())
    }

    fn close(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };

        self.context.diagnostics.in_scope(|| {
            if let Err(e) = transport::release(transport.as_ref(), self.info.interface) {
                warn!("Failed to release {}: {}", self.info, e);
            }
            debug!("Closed {}", self.info);
        });
    }

    fn info(&self) -> HidInfo {
        self.info
    }

    fn hid_report(&self) -> Result<Vec<u8>> {
        let setup = ControlSetup::report_descriptor(self.info.interface);
        self.context
            .diagnostics
            .in_scope(|| self.control_in(setup, REPORT_DESCRIPTOR_SIZE))
    }

    fn get_report(&self, report_id: u8, options: ReportOptions) -> Result<Vec<u8>> {
        let setup = ControlSetup::get_report(ReportType::Feature, report_id, self.info.interface);
        let size = options
            .buffer_size
            .unwrap_or(self.context.report_buffer_size);
        self.context
            .diagnostics
            .in_scope(|| self.control_in(setup, size))
    }

    fn set_report(&self, report_id: u8, data: &[u8]) -> Result<()> {
        let setup = ControlSetup::set_report(ReportType::Feature, report_id, self.info.interface);
        let mut buffer = data.to_vec();
        self.context.diagnostics.in_scope(|| {
            self.control_transfer(setup, &mut buffer, self.context.control_timeout)
                .map(|_| ())
        })
    }

    fn read(&self, size: Option<usize>, timeout: Duration) -> Result<Vec<u8>> {
        self.context
            .diagnostics
            .in_scope(|| self.read_input(size, timeout))
    }

    fn write(&self, data: &[u8], timeout: Duration) -> Result<usize> {
        self.context
            .diagnostics
            .in_scope(|| self.write_output(data, timeout))
    }
}

impl Drop for HidDevice {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for HidDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HidDevice")
            .field("info", &self.info)
            .field("path", &self.path)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Kernel timeouts are whole milliseconds; longer durations saturate
fn millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}
