// IAMVideoProcAmp / IAMCameraControl adapters for the two control groups

use super::mf_error;
use crate::controls::{ControlGroup, ControlKind};
use crate::provider::{ControlInterface, ProviderError, ProviderErrorKind, RawControl};
use windows::Win32::Media::DirectShow::*;

fn proc_amp_property(kind: ControlKind) -> Option<i32> {
    let property = match kind {
        ControlKind::Brightness => VideoProcAmp_Brightness,
        ControlKind::Contrast => VideoProcAmp_Contrast,
        ControlKind::Hue => VideoProcAmp_Hue,
        ControlKind::Saturation => VideoProcAmp_Saturation,
        ControlKind::Sharpness => VideoProcAmp_Sharpness,
        ControlKind::Gamma => VideoProcAmp_Gamma,
        ControlKind::WhiteBalance => VideoProcAmp_WhiteBalance,
        ControlKind::BacklightComp => VideoProcAmp_BacklightCompensation,
        ControlKind::Gain => VideoProcAmp_Gain,
        _ => return None,
    };
    Some(property.0)
}

fn camera_property(kind: ControlKind) -> Option<i32> {
    let property = match kind {
        ControlKind::Pan => CameraControl_Pan,
        ControlKind::Tilt => CameraControl_Tilt,
        ControlKind::Roll => CameraControl_Roll,
        ControlKind::Zoom => CameraControl_Zoom,
        ControlKind::Exposure => CameraControl_Exposure,
        ControlKind::Iris => CameraControl_Iris,
        ControlKind::Focus => CameraControl_Focus,
        _ => return None,
    };
    Some(property.0)
}

fn not_in_group(kind: ControlKind, group: ControlGroup) -> ProviderError {
    ProviderError::unsupported(format!("{} has no {:?} property", kind, group))
}

pub struct VideoProcAmpInterface {
    amp: IAMVideoProcAmp,
}

impl VideoProcAmpInterface {
    pub fn new(amp: IAMVideoProcAmp) -> Self {
        Self { amp }
    }
}

impl ControlInterface for VideoProcAmpInterface {
    fn group(&self) -> ControlGroup {
        ControlGroup::ImageProcessing
    }

    fn read(&self, kind: ControlKind) -> Result<RawControl, ProviderError> {
        let property =
            proc_amp_property(kind).ok_or_else(|| not_in_group(kind, self.group()))?;
        let mut raw = RawControl::default();
        let mut caps = 0i32;
        unsafe {
            self.amp
                .GetRange(
                    property,
                    &mut raw.min,
                    &mut raw.max,
                    &mut raw.step,
                    &mut raw.default,
                    &mut caps,
                )
                .map_err(|e| mf_error(ProviderErrorKind::Unsupported, "GetRange failed", e))?;
            self.amp
                .Get(property, &mut raw.current, &mut raw.flags)
                .map_err(|e| mf_error(ProviderErrorKind::Other, "Get failed", e))?;
        }
        Ok(raw)
    }

    fn write(&mut self, kind: ControlKind, value: i32, flags: i32) -> Result<(), ProviderError> {
        let property =
            proc_amp_property(kind).ok_or_else(|| not_in_group(kind, self.group()))?;
        unsafe {
            self.amp
                .Set(property, value, flags)
                .map_err(|e| mf_error(ProviderErrorKind::Rejected, "Set failed", e))
        }
    }
}

pub struct CameraControlInterface {
    camera: IAMCameraControl,
}

impl CameraControlInterface {
    pub fn new(camera: IAMCameraControl) -> Self {
        Self { camera }
    }
}

impl ControlInterface for CameraControlInterface {
    fn group(&self) -> ControlGroup {
        ControlGroup::Camera
    }

    fn read(&self, kind: ControlKind) -> Result<RawControl, ProviderError> {
        let property = camera_property(kind).ok_or_else(|| not_in_group(kind, self.group()))?;
        let mut raw = RawControl::default();
        let mut caps = 0i32;
        unsafe {
            self.camera
                .GetRange(
                    property,
                    &mut raw.min,
                    &mut raw.max,
                    &mut raw.step,
                    &mut raw.default,
                    &mut caps,
                )
                .map_err(|e| mf_error(ProviderErrorKind::Unsupported, "GetRange failed", e))?;
            self.camera
                .Get(property, &mut raw.current, &mut raw.flags)
                .map_err(|e| mf_error(ProviderErrorKind::Other, "Get failed", e))?;
        }
        Ok(raw)
    }

    fn write(&mut self, kind: ControlKind, value: i32, flags: i32) -> Result<(), ProviderError> {
        let property = camera_property(kind).ok_or_else(|| not_in_group(kind, self.group()))?;
        unsafe {
            self.camera
                .Set(property, value, flags)
                .map_err(|e| mf_error(ProviderErrorKind::Rejected, "Set failed", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_tables_follow_partition() {
        for kind in ControlKind::ALL {
            match kind.group() {
                ControlGroup::ImageProcessing => {
                    assert!(proc_amp_property(kind).is_some());
                    assert!(camera_property(kind).is_none());
                }
                ControlGroup::Camera => {
                    assert!(camera_property(kind).is_some());
                    assert!(proc_amp_property(kind).is_none());
                }
            }
        }
    }
}
