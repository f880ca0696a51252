//! In-memory capture provider
//!
//! Behaves like a well-mannered Media Foundation stack: exclusive device
//! handles, a native media type list per device, range-checked controls and
//! scripted stream faults. Clones share state, so a clone kept before the
//! provider is handed to a [`crate::Subsystem`] can be used as an observer.

use crate::controls::{ControlGroup, ControlKind, ControlMode};
use crate::provider::{
    CaptureProvider, ControlInterface, FrameRateRatio, MajorType, NativeFormat, NativeFormatInfo,
    ProviderError, ProviderSession, RawControl,
};
use crate::testing::synthetic_data::synthetic_payload;
use crate::types::{DeviceDescriptor, FormatSpec, FourCc, FrameEncoding};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// One slot of a device's native media type list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockNativeEntry {
    Ok(NativeFormatInfo),
    /// The query for this index fails.
    Fail,
}

impl MockNativeEntry {
    pub fn new(subtype: &[u8; 4], width: u32, height: u32, min: u32, nominal: u32, max: u32) -> Self {
        MockNativeEntry::Ok(NativeFormatInfo {
            subtype: FourCc::new(subtype),
            width,
            height,
            min_rate: FrameRateRatio::whole(min),
            nominal_rate: FrameRateRatio::whole(nominal),
            max_rate: FrameRateRatio::whole(max),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: String,
    pub symbolic_reference: String,
    pub native: Vec<MockNativeEntry>,
    pub controls: HashMap<ControlKind, RawControl>,
    pub read_only: HashSet<ControlKind>,
    pub missing_groups: Vec<ControlGroup>,
    /// Number of samples delivered before the stream faults.
    pub fault_after: Option<u64>,
    pub fail_open: bool,
}

fn control(min: i32, max: i32, step: i32, default: i32, mode: ControlMode) -> RawControl {
    RawControl {
        min,
        max,
        step,
        default,
        current: default,
        flags: mode.flags(),
    }
}

impl MockDevice {
    pub fn new(name: impl Into<String>, symbolic_reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbolic_reference: symbolic_reference.into(),
            native: Vec::new(),
            controls: HashMap::new(),
            read_only: HashSet::new(),
            missing_groups: Vec::new(),
            fault_after: None,
            fail_open: false,
        }
    }

    /// A typical UVC webcam with MJPEG and YUY2 modes and the full control set.
    pub fn usb_camera() -> Self {
        use ControlKind::*;
        use ControlMode::{Auto, Manual};

        let native = vec![
            MockNativeEntry::new(b"MJPG", 640, 480, 15, 30, 30),
            MockNativeEntry::new(b"MJPG", 1280, 720, 5, 15, 30),
            MockNativeEntry::new(b"YUY2", 640, 480, 15, 15, 60),
            MockNativeEntry::new(b"NV12", 640, 480, 15, 30, 30),
            MockNativeEntry::Ok(NativeFormatInfo {
                subtype: FourCc::new(b"MJPG"),
                width: 1920,
                height: 1080,
                min_rate: FrameRateRatio::new(30000, 1001),
                nominal_rate: FrameRateRatio::whole(30),
                max_rate: FrameRateRatio::whole(30),
            }),
        ];

        let controls = HashMap::from([
            (Brightness, control(0, 255, 1, 128, Manual)),
            (Contrast, control(0, 95, 1, 32, Manual)),
            (Hue, control(-2000, 2000, 1, 0, Manual)),
            (Saturation, control(0, 100, 1, 64, Manual)),
            (Sharpness, control(1, 7, 1, 2, Manual)),
            (Gamma, control(100, 300, 1, 100, Manual)),
            (WhiteBalance, control(2800, 6500, 10, 4600, Auto)),
            (BacklightComp, control(0, 2, 1, 1, Manual)),
            (Gain, control(0, 100, 1, 0, Manual)),
            (Pan, control(-36000, 36000, 3600, 0, Manual)),
            (Tilt, control(-36000, 36000, 3600, 0, Manual)),
            (Roll, control(0, 0, 1, 0, Manual)),
            (Zoom, control(100, 500, 10, 100, Manual)),
            (Exposure, control(-11, -2, 1, -6, Auto)),
            (Iris, control(0, 10, 1, 5, Manual)),
            (Focus, control(0, 255, 5, 0, Auto)),
        ]);

        Self {
            native,
            controls,
            read_only: HashSet::from([Roll]),
            ..Self::new("USB Camera", "\\\\?\\usb#vid_046d&pid_0825&mi_00#7&1a2b3c4d&0&0000")
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_symbolic_reference(mut self, symbolic_reference: impl Into<String>) -> Self {
        self.symbolic_reference = symbolic_reference.into();
        self
    }

    pub fn with_native(mut self, native: Vec<MockNativeEntry>) -> Self {
        self.native = native;
        self
    }

    pub fn with_control(mut self, kind: ControlKind, raw: RawControl) -> Self {
        self.controls.insert(kind, raw);
        self
    }

    pub fn without_control(mut self, kind: ControlKind) -> Self {
        self.controls.remove(&kind);
        self
    }

    pub fn read_only(mut self, kind: ControlKind) -> Self {
        self.read_only.insert(kind);
        self
    }

    pub fn without_group(mut self, group: ControlGroup) -> Self {
        self.missing_groups.push(group);
        self
    }

    pub fn fault_after(mut self, samples: u64) -> Self {
        self.fault_after = Some(samples);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<MockDevice>,
    fail_startup: bool,
    fail_enumeration: bool,
    startups: usize,
    shutdowns: usize,
    opens: usize,
    closes: usize,
    sample_reads: u64,
    held: HashSet<String>,
    values: HashMap<(String, ControlKind), RawControl>,
    applied: HashMap<String, NativeFormat>,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Shared,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, device: MockDevice) -> Self {
        {
            let mut state = lock(&self.state);
            for (kind, raw) in &device.controls {
                state
                    .values
                    .insert((device.symbolic_reference.clone(), *kind), *raw);
            }
            state.devices.push(device);
        }
        self
    }

    pub fn failing_startup(self) -> Self {
        lock(&self.state).fail_startup = true;
        self
    }

    pub fn failing_enumeration(self) -> Self {
        lock(&self.state).fail_enumeration = true;
        self
    }

    /// Removes a device as if it had been unplugged.
    pub fn unplug(&self, symbolic_reference: &str) {
        lock(&self.state)
            .devices
            .retain(|d| d.symbolic_reference != symbolic_reference);
    }

    pub fn startups(&self) -> usize {
        lock(&self.state).startups
    }

    pub fn shutdowns(&self) -> usize {
        lock(&self.state).shutdowns
    }

    /// Handles currently held open.
    pub fn open_sessions(&self) -> usize {
        lock(&self.state).held.len()
    }

    pub fn opens(&self) -> usize {
        lock(&self.state).opens
    }

    pub fn closes(&self) -> usize {
        lock(&self.state).closes
    }

    pub fn sample_reads(&self) -> u64 {
        lock(&self.state).sample_reads
    }

    pub fn applied_format(&self, symbolic_reference: &str) -> Option<NativeFormat> {
        lock(&self.state).applied.get(symbolic_reference).copied()
    }

    pub fn control_value(&self, symbolic_reference: &str, kind: ControlKind) -> Option<RawControl> {
        lock(&self.state)
            .values
            .get(&(symbolic_reference.to_string(), kind))
            .copied()
    }
}

impl CaptureProvider for MockProvider {
    type Session = MockSession;

    fn name(&self) -> &str {
        "mock"
    }

    fn startup(&self) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        if state.fail_startup {
            return Err(ProviderError::unavailable("capture runtime failed to start"));
        }
        state.startups += 1;
        Ok(())
    }

    fn shutdown(&self) {
        lock(&self.state).shutdowns += 1;
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, ProviderError> {
        let state = lock(&self.state);
        if state.fail_enumeration {
            return Err(ProviderError::unavailable("device query denied"));
        }
        Ok(state
            .devices
            .iter()
            .enumerate()
            .map(|(i, d)| DeviceDescriptor::new(i, d.name.clone(), d.symbolic_reference.clone()))
            .collect())
    }

    fn open_device(&self, symbolic_reference: &str) -> Result<MockSession, ProviderError> {
        let mut state = lock(&self.state);
        let device = state
            .devices
            .iter()
            .find(|d| d.symbolic_reference == symbolic_reference)
            .cloned()
            .ok_or_else(|| ProviderError::unavailable(format!("no device at {symbolic_reference}")))?;

        if device.fail_open {
            return Err(ProviderError::other("media source activation failed"));
        }
        if !state.held.insert(symbolic_reference.to_string()) {
            return Err(ProviderError::busy(format!("{symbolic_reference} is already open")));
        }
        state.opens += 1;
        drop(state);

        Ok(MockSession {
            state: Arc::clone(&self.state),
            device,
            applied: None,
            delivered: 0,
            closed: false,
        })
    }
}

pub struct MockSession {
    state: Shared,
    device: MockDevice,
    applied: Option<NativeFormat>,
    delivered: u64,
    closed: bool,
}

impl MockSession {
    /// A session not registered with any provider, over a scripted native list.
    pub fn detached(native: Vec<MockNativeEntry>) -> Self {
        Self {
            state: Shared::default(),
            device: MockDevice::new("detached", "detached").with_native(native),
            applied: None,
            delivered: 0,
            closed: false,
        }
    }

    fn accepts(&self, format: &NativeFormat) -> bool {
        let num = format.frame_rate.numerator as u64;
        let den = format.frame_rate.denominator.max(1) as u64;
        self.device.native.iter().any(|entry| match entry {
            MockNativeEntry::Ok(info) => {
                info.subtype == format.subtype
                    && info.width == format.width
                    && info.height == format.height
                    && num * info.min_rate.denominator as u64 >= info.min_rate.numerator as u64 * den
                    && num * info.max_rate.denominator as u64 <= info.max_rate.numerator as u64 * den
            }
            MockNativeEntry::Fail => false,
        })
    }

    fn current_spec(&self) -> FormatSpec {
        match self.applied {
            Some(native) => FormatSpec::new(
                native.width,
                native.height,
                FrameEncoding::from_native(native.subtype).unwrap_or(FrameEncoding::Mjpeg),
                native.frame_rate.numerator,
            ),
            None => FormatSpec::default(),
        }
    }
}

impl ProviderSession for MockSession {
    fn apply_format(&mut self, format: &NativeFormat) -> Result<(), ProviderError> {
        if format.major_type != MajorType::Video || !self.accepts(format) {
            return Err(ProviderError::rejected(format!(
                "{} {}x{} @ {}/{} is not a native type",
                format.subtype,
                format.width,
                format.height,
                format.frame_rate.numerator,
                format.frame_rate.denominator
            )));
        }
        self.applied = Some(*format);
        lock(&self.state)
            .applied
            .insert(self.device.symbolic_reference.clone(), *format);
        Ok(())
    }

    fn query_native_format(
        &mut self,
        index: usize,
    ) -> Result<Option<NativeFormatInfo>, ProviderError> {
        match self.device.native.get(index) {
            Some(MockNativeEntry::Ok(info)) => Ok(Some(*info)),
            Some(MockNativeEntry::Fail) => Err(ProviderError::other(format!(
                "native type {index} could not be read"
            ))),
            None => Ok(None),
        }
    }

    fn read_sample(&mut self) -> Result<Bytes, ProviderError> {
        lock(&self.state).sample_reads += 1;

        if self.device.fault_after.is_some_and(|n| self.delivered >= n) {
            return Err(ProviderError::stream_fault("device stopped delivering samples"));
        }
        self.delivered += 1;
        Ok(synthetic_payload(self.delivered, &self.current_spec()))
    }

    fn control_interface(
        &mut self,
        group: ControlGroup,
    ) -> Result<Box<dyn ControlInterface>, ProviderError> {
        if self.device.missing_groups.contains(&group) {
            return Err(ProviderError::unavailable(format!(
                "{group:?} interface not exposed"
            )));
        }
        Ok(Box::new(MockControls {
            state: Arc::clone(&self.state),
            symbolic_reference: self.device.symbolic_reference.clone(),
            read_only: self.device.read_only.clone(),
            group,
        }))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = lock(&self.state);
        state.held.remove(&self.device.symbolic_reference);
        state.applied.remove(&self.device.symbolic_reference);
        state.closes += 1;
    }
}

struct MockControls {
    state: Shared,
    symbolic_reference: String,
    read_only: HashSet<ControlKind>,
    group: ControlGroup,
}

impl MockControls {
    fn key(&self, kind: ControlKind) -> Result<(String, ControlKind), ProviderError> {
        if kind.group() != self.group {
            return Err(ProviderError::unsupported(format!(
                "{kind} is not a {:?} control",
                self.group
            )));
        }
        Ok((self.symbolic_reference.clone(), kind))
    }
}

impl ControlInterface for MockControls {
    fn group(&self) -> ControlGroup {
        self.group
    }

    fn read(&self, kind: ControlKind) -> Result<RawControl, ProviderError> {
        let key = self.key(kind)?;
        lock(&self.state)
            .values
            .get(&key)
            .copied()
            .ok_or_else(|| ProviderError::unsupported(format!("{kind} not supported")))
    }

    fn write(&mut self, kind: ControlKind, value: i32, flags: i32) -> Result<(), ProviderError> {
        let key = self.key(kind)?;
        if self.read_only.contains(&kind) {
            return Err(ProviderError::rejected(format!("{kind} is read-only")));
        }

        let mut state = lock(&self.state);
        let raw = state
            .values
            .get_mut(&key)
            .ok_or_else(|| ProviderError::unsupported(format!("{kind} not supported")))?;
        if value < raw.min || value > raw.max {
            return Err(ProviderError::rejected(format!(
                "{kind} value {value} outside [{}, {}]",
                raw.min, raw.max
            )));
        }
        raw.current = value;
        raw.flags = flags;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::standard_native_type;

    #[test]
    fn test_exclusive_open() {
        let provider = MockProvider::new().with_device(MockDevice::usb_camera());
        let symref = MockDevice::usb_camera().symbolic_reference;

        let mut first = provider.open_device(&symref).unwrap();
        let second = provider.open_device(&symref);
        assert_eq!(second.err().map(|e| e.kind), Some(crate::provider::ProviderErrorKind::Busy));

        first.close();
        first.close();
        assert_eq!(provider.closes(), 1);
        assert!(provider.open_device(&symref).is_ok());
    }

    #[test]
    fn test_apply_checks_native_range() {
        let provider = MockProvider::new().with_device(MockDevice::usb_camera());
        let mut session = provider
            .open_device(&MockDevice::usb_camera().symbolic_reference)
            .unwrap();

        let ok = standard_native_type(FrameEncoding::Mjpeg, 640, 480, 30).unwrap();
        assert!(session.apply_format(&ok).is_ok());

        let too_fast = standard_native_type(FrameEncoding::Mjpeg, 640, 480, 60).unwrap();
        assert!(session.apply_format(&too_fast).is_err());

        let ntsc = standard_native_type(FrameEncoding::Mjpeg, 1920, 1080, 30).unwrap();
        assert!(session.apply_format(&ntsc).is_ok());
    }

    #[test]
    fn test_fault_after() {
        let device = MockDevice::usb_camera().fault_after(2);
        let provider = MockProvider::new().with_device(device.clone());
        let mut session = provider.open_device(&device.symbolic_reference).unwrap();

        assert!(session.read_sample().is_ok());
        assert!(session.read_sample().is_ok());
        assert!(session.read_sample().unwrap_err().is_stream_fault());
        assert_eq!(provider.sample_reads(), 3);
    }

    #[test]
    fn test_controls_are_range_checked() {
        let device = MockDevice::usb_camera();
        let provider = MockProvider::new().with_device(device.clone());
        let mut session = provider.open_device(&device.symbolic_reference).unwrap();
        let mut camera = session.control_interface(ControlGroup::Camera).unwrap();

        assert!(camera.write(ControlKind::Zoom, 200, ControlMode::MANUAL_FLAG).is_ok());
        assert!(camera.write(ControlKind::Zoom, 900, ControlMode::MANUAL_FLAG).is_err());
        assert!(camera.read(ControlKind::Brightness).is_err());
        assert_eq!(
            provider
                .control_value(&device.symbolic_reference, ControlKind::Zoom)
                .map(|raw| raw.current),
            Some(200)
        );
    }
}
