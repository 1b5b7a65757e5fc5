//! Descriptor walker
//!
//! Turns the raw descriptor stream of one device node into closed
//! [`HidDevice`] handles, one per HID interface, in stream order.
//!
//! The stream carries no explicit nesting. Which endpoints belong to which
//! interface follows only from record order, so the walk is a single pass over
//! the records driven by [`WalkState`]:
//!
//! | state               | accepted records                    |
//! |---------------------|-------------------------------------|
//! | `Start`             | Device                              |
//! | `SeenDevice`        | Configuration                       |
//! | `SeenConfig`        | Configuration, Interface, Endpoint  |
//! | `BuildingInterface` | Configuration, Interface, Endpoint  |
//!
//! Records not accepted in the current state are skipped. A malformed record
//! ends the walk: the interface being built is discarded and the error is the
//! last item.

use crate::device::{DeviceContext, Endpoint, HidDevice};
use protocol::{
    DescriptorType, Descriptors, DeviceDescriptor, EndpointDescriptor, HidInfo,
    InterfaceDescriptor, ProtocolError, RawDescriptor,
};
use std::iter::FusedIterator;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Start,
    SeenDevice,
    SeenConfig,
    /// A HID interface is collecting endpoints
    BuildingInterface,
}

impl WalkState {
    /// Whether a record of type `descriptor_type` is acted on in this state
    pub fn accepts(self, descriptor_type: DescriptorType) -> bool {
        match self {
            WalkState::Start => descriptor_type == DescriptorType::Device,
            WalkState::SeenDevice => descriptor_type == DescriptorType::Configuration,
            WalkState::SeenConfig | WalkState::BuildingInterface => matches!(
                descriptor_type,
                DescriptorType::Configuration
                    | DescriptorType::Interface
                    | DescriptorType::Endpoint
            ),
        }
    }
}

/// A HID interface whose endpoints are still arriving
#[derive(Debug, Clone)]
struct PendingInterface {
    info: HidInfo,
    input: Option<Endpoint>,
    output: Option<Endpoint>,
}

impl PendingInterface {
    fn new(device: &DeviceDescriptor, interface: &InterfaceDescriptor) -> Self {
        Self {
            info: HidInfo {
                vendor_id: device.vendor_id,
                product_id: device.product_id,
                revision: device.revision,
                subclass: interface.subclass,
                protocol: interface.protocol,
                interface: interface.number,
            },
            input: None,
            output: None,
        }
    }

    fn is_full(&self) -> bool {
        self.input.is_some() && self.output.is_some()
    }

    /// First endpoint seen in each direction wins
    fn assign(&mut self, endpoint: &EndpointDescriptor) {
        let slot = if endpoint.is_in() {
            &mut self.input
        } else {
            &mut self.output
        };
        if slot.is_none() {
            *slot = Some(Endpoint::from(endpoint));
        }
    }

    fn reset(&mut self) {
        self.input = None;
        self.output = None;
    }
}

/// Single-pass iterator over the HID interfaces of one descriptor stream
pub struct DescriptorWalker<'a> {
    records: Descriptors<'a>,
    path: PathBuf,
    context: DeviceContext,
    state: WalkState,
    device: DeviceDescriptor,
    pending: Option<PendingInterface>,
    finished: bool,
}

impl<'a> DescriptorWalker<'a> {
    /// Walk `bytes`, read from the device node at `path`
    pub fn new(bytes: &'a [u8], path: impl Into<PathBuf>, context: DeviceContext) -> Self {
        Self {
            records: Descriptors::new(bytes),
            path: path.into(),
            context,
            state: WalkState::Start,
            device: DeviceDescriptor::default(),
            pending: None,
            finished: false,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    fn step(&mut self, record: RawDescriptor<'_>) -> Result<Option<HidDevice>, ProtocolError> {
        if !self.state.accepts(record.descriptor_type) {
            return Ok(None);
        }

        match record.descriptor_type {
            DescriptorType::Device => {
                self.device = DeviceDescriptor::parse(record.body)?;
                self.state = WalkState::SeenDevice;
                Ok(None)
            }
            DescriptorType::Configuration => {
                let flushed = self.pending.take();
                self.state = WalkState::SeenConfig;
                Ok(flushed.map(|p| self.build(p)))
            }
            DescriptorType::Interface => {
                let interface = InterfaceDescriptor::parse(record.body)?;
                let flushed = self.pending.take();

                if interface.is_hid() {
                    self.pending = Some(PendingInterface::new(&self.device, &interface));
                    self.state = WalkState::BuildingInterface;
                } else {
                    self.state = WalkState::SeenConfig;
                }
                Ok(flushed.map(|p| self.build(p)))
            }
            DescriptorType::Endpoint => {
                let Some(pending) = self.pending.as_mut() else {
                    return Ok(None);
                };
                let endpoint = EndpointDescriptor::parse(record.body)?;

                // Both slots taken: emit what we have and start over with the
                // same identity, beginning with this endpoint.
                let flushed = if pending.is_full() {
                    let full = pending.clone();
                    pending.reset();
                    Some(full)
                } else {
                    None
                };
                pending.assign(&endpoint);
                Ok(flushed.map(|p| self.build(p)))
            }
            _ => Ok(None),
        }
    }

    fn build(&self, pending: PendingInterface) -> HidDevice {
        debug!(
            "Found HID interface {} ({}) at {}",
            pending.info.interface,
            pending.info,
            self.path.display()
        );
        HidDevice::new(
            pending.info,
            self.path.clone(),
            pending.input,
            pending.output,
            self.context.clone(),
        )
    }
}

impl Iterator for DescriptorWalker<'_> {
    type Item = Result<HidDevice, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let result = match self.records.next() {
                Some(Ok(record)) => self.step(record),
                Some(Err(e)) => Err(e),
                None => {
                    self.finished = true;
                    return self.pending.take().map(|p| Ok(self.build(p)));
                }
            };

            match result {
                Ok(Some(device)) => return Some(Ok(device)),
                Ok(None) => {}
                Err(e) => {
                    self.finished = true;
                    self.pending = None;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl FusedIterator for DescriptorWalker<'_> {}
