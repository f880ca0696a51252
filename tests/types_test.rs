//! Tests for vidcap core types
//!
//! Covers the value types shared by the lifecycle, negotiation and CLI layers.

use bytes::Bytes;
use vidcap::types::{
    DeviceDescriptor, FormatSpec, FourCc, Frame, FrameEncoding, Platform, Resolution,
};

#[cfg(test)]
mod platform_tests {
    use super::*;

    #[test]
    fn test_platform_as_str() {
        assert_eq!(Platform::Windows.as_str(), "windows");
        assert_eq!(Platform::MacOS.as_str(), "macos");
        assert_eq!(Platform::Linux.as_str(), "linux");
        assert_eq!(Platform::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_platform_serialization() {
        let json = serde_json::to_string(&Platform::Linux).unwrap();
        assert!(json.contains("Linux"));
        let back: Platform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Platform::Linux);
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn test_format_creation() {
        let format = FormatSpec::new(1920, 1080, FrameEncoding::Mjpeg, 30);
        assert_eq!(format.width(), 1920);
        assert_eq!(format.height(), 1080);
        assert_eq!(format.resolution, Resolution::new(1920, 1080));
        assert_eq!(format.frame_rate, 30);
    }

    #[test]
    fn test_format_builders() {
        let format = FormatSpec::default()
            .with_resolution(Resolution::new(1280, 720))
            .with_encoding(FrameEncoding::Yuy2)
            .with_frame_rate(60);
        assert_eq!(format, FormatSpec::new(1280, 720, FrameEncoding::Yuy2, 60));
    }

    #[test]
    fn test_format_equality_is_structural() {
        let a = FormatSpec::new(640, 480, FrameEncoding::Mjpeg, 30);
        assert_eq!(a, FormatSpec::new(640, 480, FrameEncoding::Mjpeg, 30));
        assert_ne!(a, a.with_frame_rate(15));
        assert_ne!(a, a.with_encoding(FrameEncoding::Yuy2));
    }

    #[test]
    fn test_format_parse_variants() {
        assert_eq!(
            "1280x720@30:mjpg".parse::<FormatSpec>().unwrap(),
            FormatSpec::new(1280, 720, FrameEncoding::Mjpeg, 30)
        );
        assert_eq!(
            "640x480@15:YUYV".parse::<FormatSpec>().unwrap(),
            FormatSpec::new(640, 480, FrameEncoding::Yuy2, 15)
        );
        assert!("640x480".parse::<FormatSpec>().is_err());
        assert!("640x480@15".parse::<FormatSpec>().is_err());
        assert!("640by480@15:MJPEG".parse::<FormatSpec>().is_err());
        assert!("640x480@15:H264".parse::<FormatSpec>().is_err());
    }

    #[test]
    fn test_format_serialization() {
        let format = FormatSpec::new(1280, 720, FrameEncoding::Nv12, 30);
        let json = serde_json::to_string(&format).unwrap();
        assert!(json.contains("\"NV12\""));
        let back: FormatSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, format);
    }

    #[test]
    fn test_resolution_ordering_and_pixels() {
        let small = Resolution::new(640, 480);
        let large = Resolution::new(1920, 1080);
        assert!(small < large);
        assert_eq!(large.pixels(), 2_073_600);
        assert_eq!(large.to_string(), "1920x1080");
    }
}

#[cfg(test)]
mod encoding_tests {
    use super::*;

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCc::new(b"MJPG").to_string(), "MJPG");
        assert_eq!(FourCc([0, b'A', b'B', b'C']).to_string(), ".ABC");
    }

    #[test]
    fn test_recognized_encodings() {
        for encoding in FrameEncoding::RECOGNIZED {
            assert_eq!(FrameEncoding::from_native(encoding.fourcc()), Some(encoding));
        }
        assert_eq!(FrameEncoding::from_native(FrameEncoding::Nv12.fourcc()), None);
    }

    #[test]
    fn test_encoding_parse_is_case_insensitive() {
        assert_eq!("mjpeg".parse::<FrameEncoding>().unwrap(), FrameEncoding::Mjpeg);
        assert_eq!("nv12".parse::<FrameEncoding>().unwrap(), FrameEncoding::Nv12);
        assert!("rgb24".parse::<FrameEncoding>().is_err());
    }
}

#[cfg(test)]
mod frame_tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let frame = Frame {
            sequence: 1,
            timestamp_us: 33_333,
            format: FormatSpec::default(),
            data: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
        };
        assert_eq!(frame.len(), 4);
        assert!(!frame.is_empty());
        assert_eq!(frame.as_bytes()[..2], [0xFF, 0xD8]);
    }

    #[test]
    fn test_frame_json_omits_payload() {
        let frame = Frame {
            sequence: 7,
            timestamp_us: 0,
            format: FormatSpec::default(),
            data: Bytes::from(vec![1u8; 1024]),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"sequence\":7"));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = DeviceDescriptor::new(0, "USB Camera", "/dev/video0");
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: DeviceDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }
}
