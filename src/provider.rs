//! Platform Capture Provider contract.
//!
//! The capture core never talks to an OS API directly. A provider supplies
//! device discovery, per-device sessions, native format descriptors, frame
//! samples and the two control sub-interfaces; the core turns those into
//! the lifecycle, negotiation and control semantics of [`crate::CaptureDevice`].

use crate::controls::{ControlGroup, ControlKind};
use crate::types::{DeviceDescriptor, FourCc, FrameEncoding};
use bytes::Bytes;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// The subsystem, device or sub-interface cannot be reached.
    Unavailable,
    /// The request names something the provider has no mapping for.
    Unsupported,
    /// The provider understood the request and refused it.
    Rejected,
    /// The stream reported an error or end-of-stream.
    StreamFault,
    /// Another session already holds the device.
    Busy,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unsupported, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Rejected, message)
    }

    pub fn stream_fault(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::StreamFault, message)
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Busy, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message)
    }

    pub fn is_stream_fault(&self) -> bool {
        self.kind == ProviderErrorKind::StreamFault
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ProviderError {}

/// A rate expressed as `numerator / denominator` frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRateRatio {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRateRatio {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub const fn whole(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    /// Integral rate, if the ratio is expressed over a denominator of 1.
    pub fn as_whole(&self) -> Option<u32> {
        (self.denominator == 1).then_some(self.numerator)
    }

    /// Both halves packed the way Media Foundation stores ratio attributes.
    pub fn pack(&self) -> u64 {
        ((self.numerator as u64) << 32) | self.denominator as u64
    }

    pub fn unpack(packed: u64) -> Self {
        Self::new((packed >> 32) as u32, packed as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MajorType {
    Video,
}

/// A format descriptor in the provider's own attribute model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeFormat {
    pub major_type: MajorType,
    pub subtype: FourCc,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRateRatio,
}

impl NativeFormat {
    pub fn video(subtype: FourCc, width: u32, height: u32, frame_rate: FrameRateRatio) -> Self {
        Self {
            major_type: MajorType::Video,
            subtype,
            width,
            height,
            frame_rate,
        }
    }
}

/// One entry of a stream's native media type list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeFormatInfo {
    pub subtype: FourCc,
    pub width: u32,
    pub height: u32,
    pub min_rate: FrameRateRatio,
    pub nominal_rate: FrameRateRatio,
    pub max_rate: FrameRateRatio,
}

/// Raw control tuple as read from a control sub-interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawControl {
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub default: i32,
    pub current: i32,
    pub flags: i32,
}

/// One of the two control sub-interfaces of an open device.
pub trait ControlInterface {
    fn group(&self) -> ControlGroup;

    /// Declared range plus the current value and mode flags.
    fn read(&self, kind: ControlKind) -> Result<RawControl, ProviderError>;

    fn write(&mut self, kind: ControlKind, value: i32, flags: i32) -> Result<(), ProviderError>;
}

/// An open device handle.
pub trait ProviderSession {
    fn apply_format(&mut self, format: &NativeFormat) -> Result<(), ProviderError>;

    /// `Ok(None)` marks the end of the native type list.
    fn query_native_format(&mut self, index: usize)
        -> Result<Option<NativeFormatInfo>, ProviderError>;

    /// Blocks until the next sample arrives. Stream errors and end-of-stream
    /// come back as [`ProviderErrorKind::StreamFault`].
    fn read_sample(&mut self) -> Result<Bytes, ProviderError>;

    fn control_interface(
        &mut self,
        group: ControlGroup,
    ) -> Result<Box<dyn ControlInterface>, ProviderError>;

    /// Releases the device. Called exactly once by the owning session.
    fn close(&mut self);
}

pub trait CaptureProvider {
    type Session: ProviderSession;

    fn name(&self) -> &str;

    /// Must tolerate repeated calls; each successful call is paired with one
    /// `shutdown`.
    fn startup(&self) -> Result<(), ProviderError>;

    fn shutdown(&self);

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, ProviderError>;

    fn open_device(&self, symbolic_reference: &str) -> Result<Self::Session, ProviderError>;

    fn create_native_type(
        &self,
        encoding: FrameEncoding,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<NativeFormat, ProviderError> {
        standard_native_type(encoding, width, height, frame_rate)
    }
}

/// Video descriptor for the encodings every provider maps (MJPEG, YUY2).
pub fn standard_native_type(
    encoding: FrameEncoding,
    width: u32,
    height: u32,
    frame_rate: u32,
) -> Result<NativeFormat, ProviderError> {
    match encoding {
        FrameEncoding::Mjpeg | FrameEncoding::Yuy2 => Ok(NativeFormat::video(
            encoding.fourcc(),
            width,
            height,
            FrameRateRatio::whole(frame_rate),
        )),
        other => Err(ProviderError::unsupported(format!(
            "no native subtype for {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_packing() {
        let ratio = FrameRateRatio::new(30000, 1001);
        assert_eq!(FrameRateRatio::unpack(ratio.pack()), ratio);
        assert_eq!(ratio.as_whole(), None);
        assert_eq!(FrameRateRatio::whole(30).as_whole(), Some(30));
    }

    #[test]
    fn test_standard_native_type() {
        let native = standard_native_type(FrameEncoding::Mjpeg, 640, 480, 15).unwrap();
        assert_eq!(native.major_type, MajorType::Video);
        assert_eq!(native.subtype, FourCc::new(b"MJPG"));
        assert_eq!(native.frame_rate, FrameRateRatio::whole(15));

        let err = standard_native_type(FrameEncoding::Nv12, 640, 480, 15).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Unsupported);
    }
}
