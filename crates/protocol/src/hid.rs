//! HID class control requests
//!
//! Setup packets for the requests a HID host issues on endpoint zero, from the
//! Device Class Definition for HID 1.11, section 7.

use crate::descriptor::DescriptorType;

/// bmRequestType: device-to-host, standard, recipient interface
pub const REQUEST_TYPE_STANDARD_IN: u8 = 0x81;
/// bmRequestType: device-to-host, class, recipient interface
pub const REQUEST_TYPE_CLASS_IN: u8 = 0xa1;
/// bmRequestType: host-to-device, class, recipient interface
pub const REQUEST_TYPE_CLASS_OUT: u8 = 0x21;

pub const GET_DESCRIPTOR: u8 = 0x06;
pub const GET_REPORT: u8 = 0x01;
pub const SET_REPORT: u8 = 0x09;

/// Report type carried in the high byte of wValue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Input = 1,
    Output = 2,
    Feature = 3,
}

impl ReportType {
    /// wValue for GET_REPORT/SET_REPORT
    pub const fn value(self, report_id: u8) -> u16 {
        ((self as u16) << 8) | report_id as u16
    }
}

/// The fixed part of a control transfer setup packet
///
/// wLength is not carried here; it always follows from the data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlSetup {
    pub const fn new(request_type: u8, request: u8, value: u16, index: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index,
        }
    }

    /// GET_DESCRIPTOR for the report descriptor of `interface`
    pub const fn report_descriptor(interface: u8) -> Self {
        Self::new(
            REQUEST_TYPE_STANDARD_IN,
            GET_DESCRIPTOR,
            (DescriptorType::Report.code() as u16) << 8,
            interface as u16,
        )
    }

    pub const fn get_report(report_type: ReportType, report_id: u8, interface: u8) -> Self {
        Self::new(
            REQUEST_TYPE_CLASS_IN,
            GET_REPORT,
            report_type.value(report_id),
            interface as u16,
        )
    }

    pub const fn set_report(report_type: ReportType, report_id: u8, interface: u8) -> Self {
        Self::new(
            REQUEST_TYPE_CLASS_OUT,
            SET_REPORT,
            report_type.value(report_id),
            interface as u16,
        )
    }

    /// Data stage direction, bit 7 of bmRequestType
    pub const fn is_in(&self) -> bool {
        self.request_type & 0x80 != 0
    }
}
