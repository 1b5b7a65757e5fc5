//! Loopback transport for device-handle tests
//!
//! Interrupt OUT transfers are queued and handed back by the next interrupt
//! IN transfer; an IN transfer with nothing queued times out. Control
//! transfers are recorded and IN requests are answered with a canned reply.

#![allow(dead_code)]

use common::test_utils::DescriptorStream;
use hid::{Backend, ControlSetup, DeviceContext, DescriptorWalker, HidDevice, Transport};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One control transfer as the transport saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCall {
    pub setup: ControlSetup,
    /// wLength, the size of the caller's buffer
    pub length: usize,
    pub timeout_ms: u32,
    /// Payload of OUT requests
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    opened: Mutex<Vec<PathBuf>>,
    driver_calls: Mutex<Vec<&'static str>>,
    controls: Mutex<Vec<ControlCall>>,
    control_reply: Mutex<Vec<u8>>,
    queue: Mutex<VecDeque<Vec<u8>>>,
    fail: Mutex<Vec<&'static str>>,
}

impl State {
    fn record(&self, call: &'static str) -> io::Result<()> {
        self.driver_calls.lock().unwrap().push(call);
        self.check(call)
    }

    fn check(&self, call: &'static str) -> io::Result<()> {
        if self.fail.lock().unwrap().contains(&call) {
            Err(io::Error::from_raw_os_error(nix::libc::EBUSY))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopbackBackend {
    state: Arc<State>,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named operations ("open", "detach", "claim", "release",
    /// "attach") fail with EBUSY
    pub fn fail(&self, calls: &[&'static str]) {
        self.state.fail.lock().unwrap().extend_from_slice(calls);
    }

    pub fn set_control_reply(&self, reply: &[u8]) {
        *self.state.control_reply.lock().unwrap() = reply.to_vec();
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.state.opened.lock().unwrap().clone()
    }

    pub fn driver_calls(&self) -> Vec<&'static str> {
        self.state.driver_calls.lock().unwrap().clone()
    }

    pub fn controls(&self) -> Vec<ControlCall> {
        self.state.controls.lock().unwrap().clone()
    }

    pub fn context(&self) -> DeviceContext {
        DeviceContext::new(Arc::new(self.clone()))
    }
}

impl Backend for LoopbackBackend {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Transport>> {
        self.state.check("open")?;
        self.state.opened.lock().unwrap().push(path.to_path_buf());
        Ok(Box::new(LoopbackTransport {
            state: Arc::clone(&self.state),
        }))
    }
}

struct LoopbackTransport {
    state: Arc<State>,
}

impl Transport for LoopbackTransport {
    fn detach_kernel_driver(&self, _interface: u8) -> io::Result<()> {
        self.state.record("detach")
    }

    fn attach_kernel_driver(&self, _interface: u8) -> io::Result<()> {
        self.state.record("attach")
    }

    fn claim_interface(&self, _interface: u8) -> io::Result<()> {
        self.state.record("claim")
    }

    fn release_interface(&self, _interface: u8) -> io::Result<()> {
        self.state.record("release")
    }

    fn control(&self, setup: ControlSetup, data: &mut [u8], timeout_ms: u32) -> io::Result<usize> {
        self.state.controls.lock().unwrap().push(ControlCall {
            setup,
            length: data.len(),
            timeout_ms,
            data: if setup.is_in() { Vec::new() } else { data.to_vec() },
        });

        if setup.is_in() {
            let reply = self.state.control_reply.lock().unwrap();
            let n = reply.len().min(data.len());
            data[..n].copy_from_slice(&reply[..n]);
            Ok(n)
        } else {
            Ok(data.len())
        }
    }

    fn interrupt(&self, endpoint: u8, data: &mut [u8], _timeout_ms: u32) -> io::Result<usize> {
        let mut queue = self.state.queue.lock().unwrap();
        if endpoint & 0x80 == 0 {
            queue.push_back(data.to_vec());
            return Ok(data.len());
        }

        let packet = queue
            .pop_front()
            .ok_or_else(|| io::Error::from_raw_os_error(nix::libc::ETIMEDOUT))?;
        let n = packet.len().min(data.len());
        data[..n].copy_from_slice(&packet[..n]);
        Ok(n)
    }
}

/// A HID interface 0 of 16c0:05df with the given interrupt endpoints
pub fn descriptors(input: Option<(u8, u16)>, output: Option<(u8, u16)>) -> Vec<u8> {
    let mut stream = DescriptorStream::new()
        .device(0x16c0, 0x05df, 0x0100)
        .config()
        .hid_interface(0);
    if let Some((address, size)) = input {
        stream = stream.endpoint(address, size);
    }
    if let Some((address, size)) = output {
        stream = stream.endpoint(address, size);
    }
    stream.build()
}

/// The single device the walker finds in `bytes`, bound to `backend`
pub fn device_from(bytes: &[u8], backend: &LoopbackBackend) -> HidDevice {
    let mut found: Vec<HidDevice> =
        DescriptorWalker::new(bytes, "/dev/bus/usb/001/007", backend.context())
            .collect::<Result<_, _>>()
            .unwrap();
    assert_eq!(found.len(), 1);
    found.remove(0)
}
