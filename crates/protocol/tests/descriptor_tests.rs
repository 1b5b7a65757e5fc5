//! Descriptor stream integration tests
//!
//! Parses a configuration descriptor as captured from a wireless
//! keyboard/mouse receiver.
//!
//! Run with: `cargo test -p protocol --test descriptor_tests`

use protocol::{
    ConfigDescriptor, DescriptorType, Descriptors, DeviceDescriptor, EndpointDescriptor,
    HidDescriptor, InterfaceDescriptor, ProtocolError, TransferKind,
};

#[rustfmt::skip]
const RECEIVER: &[u8] = &[
    // Device
    0x12, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x08, 0x6d, 0x04, 0x2b, 0xc5,
    0x01, 0x12, 0x01, 0x02, 0x00, 0x01,
    // Configuration
    0x09, 0x02, 0x3b, 0x00, 0x02, 0x01, 0x04, 0xa0, 0x31,
    // Interface 0: boot keyboard
    0x09, 0x04, 0x00, 0x00, 0x01, 0x03, 0x01, 0x01, 0x00,
    0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x3b, 0x00,
    0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x08,
    // Interface 1: boot mouse
    0x09, 0x04, 0x01, 0x00, 0x01, 0x03, 0x01, 0x02, 0x00,
    0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x94, 0x00,
    0x07, 0x05, 0x82, 0x03, 0x08, 0x00, 0x02,
];

#[test]
fn test_record_sequence() {
    let types: Vec<DescriptorType> = Descriptors::new(RECEIVER)
        .map(|r| r.unwrap().descriptor_type)
        .collect();

    assert_eq!(
        types,
        vec![
            DescriptorType::Device,
            DescriptorType::Configuration,
            DescriptorType::Interface,
            DescriptorType::Hid,
            DescriptorType::Endpoint,
            DescriptorType::Interface,
            DescriptorType::Hid,
            DescriptorType::Endpoint,
        ]
    );
}

#[test]
fn test_decode_captured_records() {
    let records: Vec<_> = Descriptors::new(RECEIVER).map(|r| r.unwrap()).collect();

    let device = DeviceDescriptor::parse(records[0].body).unwrap();
    assert_eq!(device.vendor_id, 0x046d);
    assert_eq!(device.product_id, 0xc52b);
    assert_eq!(device.revision, 0x1201);
    assert_eq!(device.max_packet_size0, 8);

    let config = ConfigDescriptor::parse(records[1].body).unwrap();
    assert_eq!(config.total_length as usize, RECEIVER.len() - DeviceDescriptor::SIZE);
    assert_eq!(config.num_interfaces, 2);

    let mouse = InterfaceDescriptor::parse(records[5].body).unwrap();
    assert!(mouse.is_hid());
    assert_eq!((mouse.number, mouse.subclass, mouse.protocol), (1, 1, 2));

    let hid = HidDescriptor::parse(records[6].body).unwrap();
    assert_eq!(hid.report_descriptor_length, 0x94);

    let endpoint = EndpointDescriptor::parse(records[7].body).unwrap();
    assert!(endpoint.is_in());
    assert_eq!(endpoint.number(), 2);
    assert_eq!(endpoint.transfer_kind(), TransferKind::Interrupt);
    assert_eq!(endpoint.interval, 2);
}

#[test]
fn test_truncated_capture() {
    let cut = &RECEIVER[..RECEIVER.len() - 3];
    let results: Vec<_> = Descriptors::new(cut).collect();

    assert_eq!(results.len(), 8);
    assert!(results[..7].iter().all(|r| r.is_ok()));
    assert_eq!(
        results[7],
        Err(ProtocolError::Truncated {
            offset: RECEIVER.len() - 7,
            declared: 7,
            remaining: 4,
        })
    );
}

#[test]
fn test_offsets_are_cumulative() {
    let offsets: Vec<usize> = Descriptors::new(RECEIVER)
        .map(|r| r.unwrap().offset)
        .collect();
    assert_eq!(offsets, vec![0, 18, 27, 36, 45, 52, 61, 70]);
}
