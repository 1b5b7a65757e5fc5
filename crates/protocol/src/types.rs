//! Identity of a discovered HID interface

use serde::{Deserialize, Serialize};
use std::fmt;

/// General information about one HID interface of one USB device
///
/// Two identical devices plugged in at once produce equal `HidInfo` values;
/// use the device node path to tell them apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HidInfo {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Device release number (bcdDevice)
    pub revision: u16,
    /// Interface subclass (1 = boot interface)
    pub subclass: u8,
    /// Interface protocol (1 = keyboard, 2 = mouse)
    pub protocol: u8,
    /// Interface number
    pub interface: u8,
}

impl fmt::Display for HidInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x}:{:04x}",
            self.vendor_id, self.product_id, self.revision
        )
    }
}
