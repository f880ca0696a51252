//! Native format enumeration and format requests through CaptureDevice.

use vidcap::testing::{MockDevice, MockNativeEntry, MockProvider};
use vidcap::{ErrorKind, FormatRequest, FormatSpec, FrameEncoding, Resolution, Subsystem};

fn device_with(native: Vec<MockNativeEntry>) -> vidcap::CaptureDevice<MockProvider> {
    let provider = MockProvider::new().with_device(MockDevice::usb_camera().with_native(native));
    let subsystem = Subsystem::startup(provider).unwrap();
    let mut device = subsystem.device(0);
    device.init(None).unwrap();
    device
}

fn rates(formats: &[FormatSpec]) -> Vec<u32> {
    formats.iter().map(|f| f.frame_rate).collect()
}

#[test]
fn test_max_equal_to_nominal_yields_two_formats() {
    let mut device = device_with(vec![MockNativeEntry::new(b"MJPG", 640, 480, 15, 30, 30)]);
    let formats = device.enumerate_native_formats().unwrap();
    assert_eq!(rates(&formats), vec![15, 30]);
}

#[test]
fn test_nominal_equal_to_min_yields_two_formats() {
    let mut device = device_with(vec![MockNativeEntry::new(b"YUY2", 640, 480, 15, 15, 60)]);
    let formats = device.enumerate_native_formats().unwrap();
    assert_eq!(rates(&formats), vec![15, 60]);
}

#[test]
fn test_usb_camera_capabilities() {
    let provider = MockProvider::new().with_device(MockDevice::usb_camera());
    let subsystem = Subsystem::startup(provider).unwrap();
    let mut device = subsystem.device(0);
    device.init(None).unwrap();

    let formats = device.enumerate_native_formats().unwrap();
    assert_eq!(
        formats,
        vec![
            FormatSpec::new(640, 480, FrameEncoding::Mjpeg, 15),
            FormatSpec::new(640, 480, FrameEncoding::Mjpeg, 30),
            FormatSpec::new(1280, 720, FrameEncoding::Mjpeg, 5),
            FormatSpec::new(1280, 720, FrameEncoding::Mjpeg, 15),
            FormatSpec::new(1280, 720, FrameEncoding::Mjpeg, 30),
            FormatSpec::new(640, 480, FrameEncoding::Yuy2, 15),
            FormatSpec::new(640, 480, FrameEncoding::Yuy2, 60),
            FormatSpec::new(1920, 1080, FrameEncoding::Mjpeg, 30),
        ]
    );

    assert_eq!(
        device.compatible_encodings().unwrap(),
        vec![FrameEncoding::Mjpeg, FrameEncoding::Yuy2]
    );
    let mjpeg = device.formats_by_resolution(FrameEncoding::Mjpeg).unwrap();
    assert_eq!(mjpeg[&Resolution::new(1280, 720)], vec![5, 15, 30]);
    assert_eq!(mjpeg.len(), 3);
}

#[test]
fn test_first_query_failure_is_error() {
    let mut device = device_with(vec![
        MockNativeEntry::Fail,
        MockNativeEntry::new(b"MJPG", 640, 480, 15, 30, 30),
    ]);
    let err = device.enumerate_native_formats().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NativeFormatQuery);
}

#[test]
fn test_later_query_failure_returns_collected() {
    let mut device = device_with(vec![
        MockNativeEntry::new(b"MJPG", 640, 480, 15, 30, 30),
        MockNativeEntry::Fail,
        MockNativeEntry::new(b"MJPG", 1280, 720, 15, 30, 30),
    ]);
    let formats = device.enumerate_native_formats().unwrap();
    assert_eq!(formats.len(), 2);
    assert!(formats.iter().all(|f| f.width() == 640));
}

#[test]
fn test_no_native_types_is_empty() {
    let mut device = device_with(Vec::new());
    assert!(device.enumerate_native_formats().unwrap().is_empty());
}

#[test]
fn test_enumeration_requires_session() {
    let provider = MockProvider::new().with_device(MockDevice::usb_camera());
    let subsystem = Subsystem::startup(provider).unwrap();
    let mut device = subsystem.device(0);
    assert_eq!(
        device.enumerate_native_formats().unwrap_err().kind(),
        ErrorKind::NativeFormatQuery
    );
}

#[test]
fn test_negotiate_applies_choice() {
    let provider = MockProvider::new().with_device(MockDevice::usb_camera());
    let subsystem = Subsystem::startup(provider).unwrap();
    let mut device = subsystem.device(0);
    device.open_stream().unwrap();

    let fastest = device
        .negotiate(&FormatRequest::HighestFrameRate { encoding: None })
        .unwrap();
    assert_eq!(fastest, FormatSpec::new(640, 480, FrameEncoding::Yuy2, 60));
    assert_eq!(device.get_format(), fastest);
    assert_eq!(device.read_frame().unwrap().len(), 640 * 480 * 2);

    let closest = device
        .negotiate(&FormatRequest::Closest(FormatSpec::new(
            1280,
            700,
            FrameEncoding::Mjpeg,
            20,
        )))
        .unwrap();
    assert_eq!(closest, FormatSpec::new(1280, 720, FrameEncoding::Mjpeg, 15));
}

#[test]
fn test_negotiate_without_match_keeps_format() {
    let mut device = device_with(vec![MockNativeEntry::new(b"MJPG", 640, 480, 15, 30, 30)]);
    let err = device
        .negotiate(&FormatRequest::HighestResolution {
            encoding: Some(FrameEncoding::Yuy2),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert_eq!(device.get_format(), FormatSpec::default());
}

#[test]
fn test_convenience_setters_go_through_set_format() {
    let provider = MockProvider::new().with_device(MockDevice::usb_camera());
    let subsystem = Subsystem::startup(provider).unwrap();
    let mut device = subsystem.device(0);
    device.open_stream().unwrap();

    device.set_resolution(Resolution::new(1280, 720)).unwrap();
    device.set_frame_rate(30).unwrap();
    assert_eq!(
        device.get_format(),
        FormatSpec::new(1280, 720, FrameEncoding::Mjpeg, 30)
    );

    let err = device.set_encoding(FrameEncoding::Yuy2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert_eq!(device.get_format().encoding, FrameEncoding::Mjpeg);
}
