//! The capture device state machine.
//!
//! A [`CaptureDevice`] moves between three states:
//!
//! ```text
//! Uninitialized --init--> Initialized --open_stream--> Streaming
//!       ^                      |                           |
//!       +------close_stream----+---------------------------+
//! ```
//!
//! It owns at most one [`CaptureSession`] and performs no internal locking;
//! callers serialize access to a single device.

use crate::controls::{ControlKind, ControlMode, ControlState};
use crate::enumerator;
use crate::errors::{CaptureError, Result};
use crate::negotiator::{self, FormatRequest};
use crate::provider::{CaptureProvider, ProviderSession};
use crate::session::CaptureSession;
use crate::subsystem::Subsystem;
use crate::types::{DeviceDescriptor, FormatSpec, Frame, FrameEncoding, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Uninitialized,
    Initialized,
    Streaming,
}

pub struct CaptureDevice<P: CaptureProvider> {
    // Declared before `subsystem` so the session is released before the
    // last subsystem token can shut the provider down.
    session: Option<CaptureSession<P::Session>>,
    subsystem: Subsystem<P>,
    index: usize,
    descriptor: Option<DeviceDescriptor>,
    format: FormatSpec,
    /// Format last accepted by the hardware in the current session.
    applied: Option<FormatSpec>,
    /// Format in effect before a pending `set_format` on a closed device.
    before_pending: Option<FormatSpec>,
    streaming: bool,
    sequence: u64,
    stream_started: Option<Instant>,
}

impl<P: CaptureProvider> CaptureDevice<P> {
    pub fn new(subsystem: Subsystem<P>, index: usize) -> Self {
        Self {
            session: None,
            subsystem,
            index,
            descriptor: None,
            format: FormatSpec::default(),
            applied: None,
            before_pending: None,
            streaming: false,
            sequence: 0,
            stream_started: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> DeviceState {
        match (&self.session, self.streaming) {
            (None, _) => DeviceState::Uninitialized,
            (Some(_), false) => DeviceState::Initialized,
            (Some(_), true) => DeviceState::Streaming,
        }
    }

    /// Descriptor captured by the last successful `init`.
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.descriptor.as_ref()
    }

    /// Opens the provider session for the device at this index.
    ///
    /// Stores `preferred` (or the 640x480 MJPEG @ 15 default) without
    /// applying it. Calling this on an initialized device releases the old
    /// session first.
    pub fn init(&mut self, preferred: Option<FormatSpec>) -> Result<()> {
        self.before_pending = None;
        self.open_session(preferred.unwrap_or_default())
    }

    fn open_session(&mut self, format: FormatSpec) -> Result<()> {
        negotiator::validate(&format)?;

        if self.session.is_some() {
            log::debug!("Re-initializing device {}, releasing old session", self.index);
            self.close_stream();
        }

        let provider = self.subsystem.provider();
        let devices = enumerator::enumerate(provider)?;
        let descriptor = devices.get(self.index).cloned().ok_or(
            CaptureError::DeviceIndexOutOfRange {
                index: self.index,
                available: devices.len(),
            },
        )?;

        let session = CaptureSession::open(provider, descriptor.clone())?;
        self.session = Some(session);
        self.descriptor = Some(descriptor);
        self.format = format;
        self.applied = None;

        log::info!("Device {} initialized with format {}", self.index, self.format);
        Ok(())
    }

    pub fn get_format(&self) -> FormatSpec {
        self.format
    }

    /// Applies `spec` to the hardware.
    ///
    /// On failure the previously applied format is put back and
    /// [`get_format`](Self::get_format) is unchanged. On an uninitialized
    /// device the format is checked and stored as pending.
    pub fn set_format(&mut self, spec: FormatSpec) -> Result<()> {
        let provider = self.subsystem.provider();
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => {
                negotiator::build_native_descriptor(provider, &spec)?;
                log::debug!("Device {} not initialized, {} stored as pending", self.index, spec);
                self.before_pending.get_or_insert(self.format);
                self.format = spec;
                return Ok(());
            }
        };

        match negotiator::apply_format(provider, session.handle_mut(), &spec) {
            Ok(_) => {
                self.format = spec;
                self.applied = Some(spec);
                Ok(())
            }
            Err(e) => {
                log::warn!("Device {} rejected format {}: {}", self.index, spec, e);
                if let Some(previous) = self.applied {
                    if let Err(restore) =
                        negotiator::apply_format(provider, session.handle_mut(), &previous)
                    {
                        log::warn!("Could not restore format {}: {}", previous, restore);
                    }
                }
                Err(e)
            }
        }
    }

    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<()> {
        self.set_format(self.format.with_resolution(resolution))
    }

    pub fn set_frame_rate(&mut self, frame_rate: u32) -> Result<()> {
        self.set_format(self.format.with_frame_rate(frame_rate))
    }

    pub fn set_encoding(&mut self, encoding: FrameEncoding) -> Result<()> {
        self.set_format(self.format.with_encoding(encoding))
    }

    /// Picks a native format matching `request` and applies it.
    pub fn negotiate(&mut self, request: &FormatRequest) -> Result<FormatSpec> {
        let available = self.enumerate_native_formats()?;
        let chosen = negotiator::resolve_request(request, &available).ok_or_else(|| {
            CaptureError::UnsupportedFormat(format!("no native format satisfies {request:?}"))
        })?;
        self.set_format(chosen)?;
        Ok(chosen)
    }

    /// Starts streaming, initializing first if no session is held.
    ///
    /// On a device that is already streaming this only re-applies the
    /// stored format. If the hardware rejects a format stored while the
    /// device was closed, the format from before it is restored and a
    /// session opened by this call is released again.
    pub fn open_stream(&mut self) -> Result<()> {
        let opened_here = self.session.is_none();
        if opened_here {
            self.open_session(self.format)?;
        }

        let format = self.format;
        let provider = self.subsystem.provider();
        let session = self.session.as_mut().ok_or(CaptureError::StreamNotOpen)?;
        if let Err(e) = negotiator::apply_format(provider, session.handle_mut(), &format) {
            if let Some(previous) = self.before_pending.take() {
                log::warn!(
                    "Device {} rejected pending format {}, reverting to {}",
                    self.index,
                    format,
                    previous
                );
                self.format = previous;
            }
            if opened_here {
                self.close_stream();
            }
            return Err(e);
        }
        self.applied = Some(format);
        self.before_pending = None;

        if !self.streaming {
            self.streaming = true;
            self.sequence = 0;
            self.stream_started = Some(Instant::now());
            log::info!("Device {} streaming at {}", self.index, format);
        }
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Blocks until the next frame arrives.
    ///
    /// A stream fault closes the device before the error is returned; the
    /// stream must be reopened before reading again.
    pub fn read_frame(&mut self) -> Result<Frame> {
        if !self.streaming {
            return Err(CaptureError::StreamNotOpen);
        }
        let session = self.session.as_mut().ok_or(CaptureError::StreamNotOpen)?;
        let sample = session.handle_mut().read_sample();

        match sample {
            Ok(data) => {
                self.sequence += 1;
                let timestamp_us = self
                    .stream_started
                    .map(|t| t.elapsed().as_micros() as u64)
                    .unwrap_or_default();
                log::trace!("Frame {} ({} bytes)", self.sequence, data.len());
                Ok(Frame {
                    sequence: self.sequence,
                    timestamp_us,
                    format: self.format,
                    data,
                })
            }
            Err(e) if e.is_stream_fault() => {
                log::warn!("Stream fault on device {}, closing: {}", self.index, e);
                self.close_stream();
                Err(CaptureError::frame_read(e))
            }
            Err(e) => Err(CaptureError::frame_read(e)),
        }
    }

    /// Releases the provider session. Safe to call when already closed.
    pub fn close_stream(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("Closing device {} ({})", self.index, session.descriptor().name);
        }
        self.streaming = false;
        self.applied = None;
        self.stream_started = None;
    }

    pub fn get_control(&self, kind: ControlKind) -> Result<ControlState> {
        let session = self.session.as_ref().ok_or_else(|| {
            CaptureError::ControlReadError(format!("device {} is not initialized", self.index))
        })?;
        let raw = session.read_control(kind)?;

        Ok(ControlState {
            kind,
            min: raw.min,
            max: raw.max,
            step: raw.step,
            current: raw.current,
            default: raw.default,
            mode: ControlMode::from_flags(raw.flags),
        })
    }

    /// Writes `value` as-is; range checking is left to the provider.
    pub fn set_control(&mut self, kind: ControlKind, value: i32, mode: ControlMode) -> Result<()> {
        self.get_control(kind)?;

        let session = self.session.as_mut().ok_or_else(|| {
            CaptureError::ControlWriteError(format!("device {} is not initialized", self.index))
        })?;
        session.write_control(kind, value, mode.flags())?;
        log::debug!("Set {} to {} ({:?})", kind, value, mode);
        Ok(())
    }

    /// Every control the device answers for, in catalog order.
    pub fn supported_controls(&self) -> Result<Vec<ControlState>> {
        if self.session.is_none() {
            return Err(CaptureError::ControlReadError(format!(
                "device {} is not initialized",
                self.index
            )));
        }
        Ok(ControlKind::ALL
            .into_iter()
            .filter_map(|kind| self.get_control(kind).ok())
            .collect())
    }

    pub fn enumerate_native_formats(&mut self) -> Result<Vec<FormatSpec>> {
        let index = self.index;
        let session = self.session.as_mut().ok_or_else(|| {
            CaptureError::NativeFormatQueryError(format!("device {index} is not initialized"))
        })?;
        negotiator::enumerate_native_formats(session.handle_mut())
    }

    pub fn compatible_encodings(&mut self) -> Result<Vec<FrameEncoding>> {
        Ok(negotiator::compatible_encodings(&self.enumerate_native_formats()?))
    }

    pub fn formats_by_resolution(
        &mut self,
        encoding: FrameEncoding,
    ) -> Result<BTreeMap<Resolution, Vec<u32>>> {
        Ok(negotiator::formats_by_resolution(
            &self.enumerate_native_formats()?,
            encoding,
        ))
    }
}

impl<P: CaptureProvider> Drop for CaptureDevice<P> {
    fn drop(&mut self) {
        self.close_stream();
    }
}
