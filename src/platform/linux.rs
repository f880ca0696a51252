//! Video4Linux2 provider (enabled with the `v4l2` feature).
//!
//! Devices are `/dev/video*` nodes and the node path is the symbolic
//! reference. User-class controls form the image-processing group and
//! camera-class controls the camera group.

use crate::controls::{ControlGroup, ControlKind, ControlMode};
use crate::provider::{
    CaptureProvider, ControlInterface, FrameRateRatio, NativeFormat, NativeFormatInfo,
    ProviderError, ProviderErrorKind, ProviderSession, RawControl,
};
use crate::types::{DeviceDescriptor, FourCc};
use bytes::Bytes;
use v4l::buffer::Type;
use v4l::control::{Control, Value};
use v4l::frameinterval::FrameIntervalEnum;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Fraction, FourCC};

const BUFFER_COUNT: u32 = 4;

// V4L2_CID_* values from videodev2.h
const CID_BRIGHTNESS: u32 = 0x0098_0900;
const CID_CONTRAST: u32 = 0x0098_0901;
const CID_SATURATION: u32 = 0x0098_0902;
const CID_HUE: u32 = 0x0098_0903;
const CID_AUTO_WHITE_BALANCE: u32 = 0x0098_090c;
const CID_GAMMA: u32 = 0x0098_0910;
const CID_AUTOGAIN: u32 = 0x0098_0912;
const CID_GAIN: u32 = 0x0098_0913;
const CID_HUE_AUTO: u32 = 0x0098_0919;
const CID_WHITE_BALANCE_TEMPERATURE: u32 = 0x0098_091a;
const CID_SHARPNESS: u32 = 0x0098_091b;
const CID_BACKLIGHT_COMPENSATION: u32 = 0x0098_091c;
const CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
const CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
const CID_PAN_ABSOLUTE: u32 = 0x009a_0908;
const CID_TILT_ABSOLUTE: u32 = 0x009a_0909;
const CID_FOCUS_ABSOLUTE: u32 = 0x009a_090a;
const CID_FOCUS_AUTO: u32 = 0x009a_090c;
const CID_ZOOM_ABSOLUTE: u32 = 0x009a_090d;
const CID_IRIS_ABSOLUTE: u32 = 0x009a_0911;

// V4L2_EXPOSURE_MANUAL / V4L2_EXPOSURE_APERTURE_PRIORITY
const EXPOSURE_MANUAL: i64 = 1;
const EXPOSURE_APERTURE_PRIORITY: i64 = 3;

/// Value control and its auto switch, if the kind has one.
fn control_ids(kind: ControlKind) -> Option<(u32, Option<u32>)> {
    let ids = match kind {
        ControlKind::Brightness => (CID_BRIGHTNESS, None),
        ControlKind::Contrast => (CID_CONTRAST, None),
        ControlKind::Hue => (CID_HUE, Some(CID_HUE_AUTO)),
        ControlKind::Saturation => (CID_SATURATION, None),
        ControlKind::Sharpness => (CID_SHARPNESS, None),
        ControlKind::Gamma => (CID_GAMMA, None),
        ControlKind::WhiteBalance => (CID_WHITE_BALANCE_TEMPERATURE, Some(CID_AUTO_WHITE_BALANCE)),
        ControlKind::BacklightComp => (CID_BACKLIGHT_COMPENSATION, None),
        ControlKind::Gain => (CID_GAIN, Some(CID_AUTOGAIN)),
        ControlKind::Pan => (CID_PAN_ABSOLUTE, None),
        ControlKind::Tilt => (CID_TILT_ABSOLUTE, None),
        ControlKind::Zoom => (CID_ZOOM_ABSOLUTE, None),
        ControlKind::Exposure => (CID_EXPOSURE_ABSOLUTE, Some(CID_EXPOSURE_AUTO)),
        ControlKind::Iris => (CID_IRIS_ABSOLUTE, None),
        ControlKind::Focus => (CID_FOCUS_ABSOLUTE, Some(CID_FOCUS_AUTO)),
        ControlKind::Roll => return None,
    };
    Some(ids)
}

fn io_error(kind: ProviderErrorKind, context: &str, e: std::io::Error) -> ProviderError {
    ProviderError::new(kind, format!("{}: {}", context, e))
}

/// Frame interval (seconds per frame) as a frame rate.
fn interval_to_rate(interval: Fraction) -> FrameRateRatio {
    let Fraction {
        numerator,
        denominator,
    } = interval;
    if numerator != 0 && denominator % numerator == 0 {
        FrameRateRatio::whole(denominator / numerator)
    } else {
        FrameRateRatio::new(denominator, numerator)
    }
}

fn rate_value(rate: &FrameRateRatio) -> f64 {
    rate.numerator as f64 / rate.denominator.max(1) as f64
}

#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Provider;

impl V4l2Provider {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureProvider for V4l2Provider {
    type Session = V4l2Session;

    fn name(&self) -> &str {
        "v4l2"
    }

    fn startup(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn shutdown(&self) {}

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, ProviderError> {
        let mut devices = Vec::new();
        for node in v4l::context::enum_devices() {
            let path = node.path().to_string_lossy().to_string();
            // Metadata nodes enumerate too; keep only capture-capable ones.
            let capture = Device::with_path(&path)
                .and_then(|dev| dev.query_caps())
                .map(|caps| caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE))
                .unwrap_or(false);
            if !capture {
                continue;
            }
            let name = node
                .name()
                .unwrap_or_else(|| format!("Video device {}", node.index()));
            devices.push(DeviceDescriptor::new(devices.len(), name, path));
        }
        Ok(devices)
    }

    fn open_device(&self, symbolic_reference: &str) -> Result<V4l2Session, ProviderError> {
        let device = Device::with_path(symbolic_reference)
            .map_err(|e| io_error(ProviderErrorKind::Unavailable, "Failed to open device", e))?;
        Ok(V4l2Session {
            path: symbolic_reference.to_string(),
            device: Some(device),
            stream: None,
            native: None,
        })
    }
}

pub struct V4l2Session {
    path: String,
    device: Option<Device>,
    stream: Option<MmapStream<'static>>,
    native: Option<Vec<NativeFormatInfo>>,
}

impl V4l2Session {
    fn device(&self) -> Result<&Device, ProviderError> {
        self.device
            .as_ref()
            .ok_or_else(|| ProviderError::unavailable(format!("{} is closed", self.path)))
    }

    /// Flattens every (fourcc, frame size) pair into one native entry.
    ///
    /// The slowest advertised interval is the minimum rate, the fastest the
    /// maximum, and the first one the driver lists the nominal rate.
    fn collect_native(device: &Device) -> std::io::Result<Vec<NativeFormatInfo>> {
        let mut native = Vec::new();
        for description in device.enum_formats()? {
            let fourcc = description.fourcc;
            for size in device.enum_framesizes(fourcc)? {
                for discrete in size.size.to_discrete() {
                    let mut rates = Vec::new();
                    for interval in
                        device.enum_frameintervals(fourcc, discrete.width, discrete.height)?
                    {
                        match interval.interval {
                            FrameIntervalEnum::Discrete(fraction) => {
                                rates.push(interval_to_rate(fraction))
                            }
                            FrameIntervalEnum::Stepwise(stepwise) => {
                                rates.push(interval_to_rate(stepwise.min));
                                rates.push(interval_to_rate(stepwise.max));
                            }
                        }
                    }
                    let Some(&nominal) = rates.first() else {
                        continue;
                    };
                    let slowest = rates
                        .iter()
                        .copied()
                        .min_by(|a, b| rate_value(a).total_cmp(&rate_value(b)))
                        .unwrap_or(nominal);
                    let fastest = rates
                        .iter()
                        .copied()
                        .max_by(|a, b| rate_value(a).total_cmp(&rate_value(b)))
                        .unwrap_or(nominal);

                    native.push(NativeFormatInfo {
                        subtype: FourCc(fourcc.repr),
                        width: discrete.width,
                        height: discrete.height,
                        min_rate: slowest,
                        nominal_rate: nominal,
                        max_rate: fastest,
                    });
                }
            }
        }
        Ok(native)
    }
}

impl ProviderSession for V4l2Session {
    fn apply_format(&mut self, format: &NativeFormat) -> Result<(), ProviderError> {
        // Buffers must be released before the format can change.
        self.stream = None;
        let device = self.device()?;

        let mut fmt = device
            .format()
            .map_err(|e| io_error(ProviderErrorKind::Other, "Failed to read format", e))?;
        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = FourCC::new(&format.subtype.0);

        let actual = device
            .set_format(&fmt)
            .map_err(|e| io_error(ProviderErrorKind::Rejected, "VIDIOC_S_FMT failed", e))?;
        if actual.width != format.width
            || actual.height != format.height
            || actual.fourcc.repr != format.subtype.0
        {
            return Err(ProviderError::rejected(format!(
                "driver substituted {}x{} {}",
                actual.width, actual.height, actual.fourcc
            )));
        }

        let fps = format.frame_rate.as_whole().unwrap_or(format.frame_rate.numerator);
        device
            .set_params(&Parameters::with_fps(fps))
            .map_err(|e| io_error(ProviderErrorKind::Rejected, "VIDIOC_S_PARM failed", e))?;
        Ok(())
    }

    fn query_native_format(
        &mut self,
        index: usize,
    ) -> Result<Option<NativeFormatInfo>, ProviderError> {
        if self.native.is_none() {
            let native = Self::collect_native(self.device()?).map_err(|e| {
                io_error(ProviderErrorKind::Other, "Failed to enumerate native formats", e)
            })?;
            self.native = Some(native);
        }
        Ok(self
            .native
            .as_ref()
            .and_then(|native| native.get(index).copied()))
    }

    fn read_sample(&mut self) -> Result<Bytes, ProviderError> {
        if self.stream.is_none() {
            let stream = MmapStream::with_buffers(self.device()?, Type::VideoCapture, BUFFER_COUNT)
                .map_err(|e| io_error(ProviderErrorKind::StreamFault, "Failed to map buffers", e))?;
            self.stream = Some(stream);
        }
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProviderError::stream_fault("stream not mapped"))?;

        let (data, _meta) = stream
            .next()
            .map_err(|e| io_error(ProviderErrorKind::StreamFault, "VIDIOC_DQBUF failed", e))?;
        Ok(Bytes::copy_from_slice(data))
    }

    fn control_interface(
        &mut self,
        group: ControlGroup,
    ) -> Result<Box<dyn ControlInterface>, ProviderError> {
        let device = Device::with_path(&self.path)
            .map_err(|e| io_error(ProviderErrorKind::Unavailable, "Failed to open control handle", e))?;
        let available = device
            .query_controls()
            .map_err(|e| io_error(ProviderErrorKind::Unavailable, "VIDIOC_QUERYCTRL failed", e))?;

        let any_in_group = ControlKind::ALL
            .into_iter()
            .filter(|kind| kind.group() == group)
            .filter_map(control_ids)
            .any(|(id, _)| available.iter().any(|d| d.id == id));
        if !any_in_group {
            return Err(ProviderError::unavailable(format!(
                "no {:?} controls on {}",
                group, self.path
            )));
        }

        Ok(Box::new(V4l2Controls { device, group }))
    }

    fn close(&mut self) {
        self.stream = None;
        self.device = None;
    }
}

struct V4l2Controls {
    device: Device,
    group: ControlGroup,
}

impl V4l2Controls {
    fn ids(&self, kind: ControlKind) -> Result<(u32, Option<u32>), ProviderError> {
        if kind.group() != self.group {
            return Err(ProviderError::unsupported(format!(
                "{} is not a {:?} control",
                kind, self.group
            )));
        }
        control_ids(kind).ok_or_else(|| ProviderError::unsupported(format!("{} has no V4L2 control", kind)))
    }

    fn value(&self, id: u32) -> Result<i64, ProviderError> {
        let control = self
            .device
            .control(id)
            .map_err(|e| io_error(ProviderErrorKind::Unsupported, "VIDIOC_G_CTRL failed", e))?;
        Ok(match control.value {
            Value::Integer(v) => v,
            Value::Boolean(b) => b as i64,
            _ => 0,
        })
    }

    fn set(&self, id: u32, value: Value) -> Result<(), ProviderError> {
        self.device
            .set_control(Control { id, value })
            .map_err(|e| io_error(ProviderErrorKind::Rejected, "VIDIOC_S_CTRL failed", e))
    }
}

impl ControlInterface for V4l2Controls {
    fn group(&self) -> ControlGroup {
        self.group
    }

    fn read(&self, kind: ControlKind) -> Result<RawControl, ProviderError> {
        let (id, auto_id) = self.ids(kind)?;
        let description = self
            .device
            .query_controls()
            .map_err(|e| io_error(ProviderErrorKind::Unavailable, "VIDIOC_QUERYCTRL failed", e))?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| ProviderError::unsupported(format!("{} not supported", kind)))?;

        let auto = match auto_id {
            Some(CID_EXPOSURE_AUTO) => self.value(CID_EXPOSURE_AUTO)? != EXPOSURE_MANUAL,
            Some(auto_id) => self.value(auto_id).unwrap_or(0) != 0,
            None => false,
        };
        let mode = if auto { ControlMode::Auto } else { ControlMode::Manual };

        Ok(RawControl {
            min: description.minimum as i32,
            max: description.maximum as i32,
            step: description.step as i32,
            default: description.default as i32,
            current: self.value(id)? as i32,
            flags: mode.flags(),
        })
    }

    fn write(&mut self, kind: ControlKind, value: i32, flags: i32) -> Result<(), ProviderError> {
        let (id, auto_id) = self.ids(kind)?;
        let auto = ControlMode::from_flags(flags) == ControlMode::Auto;

        match auto_id {
            Some(CID_EXPOSURE_AUTO) => {
                let mode = if auto { EXPOSURE_APERTURE_PRIORITY } else { EXPOSURE_MANUAL };
                self.set(CID_EXPOSURE_AUTO, Value::Integer(mode))?;
            }
            Some(auto_id) => self.set(auto_id, Value::Boolean(auto))?,
            None => {}
        }
        if auto && auto_id.is_some() {
            return Ok(());
        }
        self.set(id, Value::Integer(value as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_to_rate() {
        assert_eq!(
            interval_to_rate(Fraction::new(1, 30)),
            FrameRateRatio::whole(30)
        );
        assert_eq!(
            interval_to_rate(Fraction::new(1001, 30000)),
            FrameRateRatio::new(30000, 1001)
        );
    }

    #[test]
    fn test_roll_has_no_mapping() {
        assert!(control_ids(ControlKind::Roll).is_none());
        assert!(control_ids(ControlKind::Pan).is_some());
    }
}
