//! Control get/set protocol against the in-memory provider.

use vidcap::controls::CONTROL_GROUPS;
use vidcap::provider::RawControl;
use vidcap::testing::{MockDevice, MockProvider};
use vidcap::{ControlGroup, ControlKind, ControlMode, ErrorKind, Subsystem};

fn open(device: MockDevice) -> (MockProvider, vidcap::CaptureDevice<MockProvider>) {
    let provider = MockProvider::new().with_device(device);
    let subsystem = Subsystem::startup(provider.clone()).unwrap();
    let mut device = subsystem.device(0);
    device.init(None).unwrap();
    (provider, device)
}

#[test]
fn test_pan_step_within_range_updates_current() {
    let (_, mut device) = open(MockDevice::usb_camera());

    let before = device.get_control(ControlKind::Pan).unwrap();
    let next = before.next_step().unwrap();
    assert_eq!(next, before.current + before.step);

    device
        .set_control(ControlKind::Pan, next, ControlMode::Manual)
        .unwrap();
    let after = device.get_control(ControlKind::Pan).unwrap();
    assert_eq!(after.current, next);
    assert_eq!(after.mode, ControlMode::Manual);
}

#[test]
fn test_pan_step_past_max_is_rejected() {
    let pan_at_max = RawControl {
        min: -36000,
        max: 36000,
        step: 3600,
        default: 0,
        current: 36000,
        flags: ControlMode::MANUAL_FLAG,
    };
    let (_, mut device) = open(MockDevice::usb_camera().with_control(ControlKind::Pan, pan_at_max));

    let before = device.get_control(ControlKind::Pan).unwrap();
    assert_eq!(before.next_step(), None);
    let next = before.current + before.step;
    assert!(!before.contains(next));

    let err = device
        .set_control(ControlKind::Pan, next, ControlMode::Manual)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ControlWrite);
    assert_eq!(device.get_control(ControlKind::Pan).unwrap().current, before.current);
}

#[test]
fn test_values_are_not_clamped_locally() {
    let (provider, mut device) = open(MockDevice::usb_camera());
    let symref = MockDevice::usb_camera().symbolic_reference;

    let err = device
        .set_control(ControlKind::Brightness, 1000, ControlMode::Manual)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ControlWrite);
    assert_eq!(
        provider
            .control_value(&symref, ControlKind::Brightness)
            .map(|raw| raw.current),
        Some(128)
    );
}

#[test]
fn test_mode_flag_round_trips() {
    let (_, mut device) = open(MockDevice::usb_camera());

    let exposure = device.get_control(ControlKind::Exposure).unwrap();
    assert_eq!(exposure.mode, ControlMode::Auto);

    device
        .set_control(ControlKind::Exposure, -8, ControlMode::Manual)
        .unwrap();
    let exposure = device.get_control(ControlKind::Exposure).unwrap();
    assert_eq!(exposure.current, -8);
    assert_eq!(exposure.mode, ControlMode::Manual);

    device
        .set_control(ControlKind::Exposure, -8, ControlMode::Auto)
        .unwrap();
    assert_eq!(
        device.get_control(ControlKind::Exposure).unwrap().mode,
        ControlMode::Auto
    );
}

#[test]
fn test_read_only_control_rejects_write() {
    let (_, mut device) = open(MockDevice::usb_camera());
    device.get_control(ControlKind::Roll).unwrap();

    let err = device
        .set_control(ControlKind::Roll, 0, ControlMode::Manual)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ControlWrite);
}

#[test]
fn test_unsupported_control_fails_read_before_write() {
    let (provider, mut device) = open(MockDevice::usb_camera().without_control(ControlKind::Iris));
    let symref = MockDevice::usb_camera().symbolic_reference;

    assert_eq!(
        device.get_control(ControlKind::Iris).unwrap_err().kind(),
        ErrorKind::ControlRead
    );
    assert_eq!(
        device
            .set_control(ControlKind::Iris, 5, ControlMode::Manual)
            .unwrap_err()
            .kind(),
        ErrorKind::ControlRead
    );
    assert!(provider.control_value(&symref, ControlKind::Iris).is_none());
}

#[test]
fn test_missing_camera_group_only_affects_camera_controls() {
    let (_, device) = open(MockDevice::usb_camera().without_group(ControlGroup::Camera));

    for kind in ControlKind::ALL {
        let result = device.get_control(kind);
        match kind.group() {
            ControlGroup::ImageProcessing => assert!(result.is_ok(), "{kind} should read"),
            ControlGroup::Camera => {
                assert_eq!(result.unwrap_err().kind(), ErrorKind::ControlRead)
            }
        }
    }
}

#[test]
fn test_supported_controls_in_catalog_order() {
    let (_, device) = open(
        MockDevice::usb_camera()
            .without_control(ControlKind::Hue)
            .without_control(ControlKind::Focus),
    );

    let kinds: Vec<ControlKind> = device
        .supported_controls()
        .unwrap()
        .into_iter()
        .map(|state| state.kind)
        .collect();
    assert_eq!(kinds.len(), 14);
    assert!(!kinds.contains(&ControlKind::Hue));
    assert!(!kinds.contains(&ControlKind::Focus));
    assert!(kinds.windows(2).all(|w| (w[0] as usize) < (w[1] as usize)));
}

#[test]
fn test_controls_work_while_streaming() {
    let (_, mut device) = open(MockDevice::usb_camera());
    device.open_stream().unwrap();

    device
        .set_control(ControlKind::Zoom, 200, ControlMode::Manual)
        .unwrap();
    device.read_frame().unwrap();
    assert_eq!(device.get_control(ControlKind::Zoom).unwrap().current, 200);
}

#[test]
fn test_routing_table_is_the_partition() {
    let image = CONTROL_GROUPS
        .iter()
        .filter(|g| **g == ControlGroup::ImageProcessing)
        .count();
    assert_eq!(image, 9);
    assert_eq!(CONTROL_GROUPS.len() - image, 7);
    assert_eq!(ControlKind::BacklightComp.group(), ControlGroup::ImageProcessing);
    assert_eq!(ControlKind::Exposure.group(), ControlGroup::Camera);
}
