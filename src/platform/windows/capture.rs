use super::controls::{CameraControlInterface, VideoProcAmpInterface};
use super::mf_error;
use crate::controls::ControlGroup;
use crate::provider::{
    ControlInterface, FrameRateRatio, MajorType, NativeFormat, NativeFormatInfo, ProviderError,
    ProviderErrorKind, ProviderSession,
};
use crate::types::FourCc;
use bytes::Bytes;
use windows::core::{Interface, GUID};
use windows::Win32::Media::DirectShow::{IAMCameraControl, IAMVideoProcAmp};
use windows::Win32::Media::MediaFoundation::*;

const VIDEO_STREAM: u32 = MF_SOURCE_READER_FIRST_VIDEO_STREAM.0 as u32;

/// Video subtype GUIDs are the FourCC in `data1` over the Media Foundation base GUID.
fn subtype_guid(fourcc: FourCc) -> GUID {
    GUID::from_values(
        fourcc.as_u32(),
        0x0000,
        0x0010,
        [0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71],
    )
}

/// Frame size and rate attributes for a requested type. The rate range is
/// pinned to the requested rate; some drivers refuse a type without it.
fn size_and_rate_attributes(format: &NativeFormat) -> [(GUID, u64); 4] {
    let rate = format.frame_rate.pack();
    [
        (
            MF_MT_FRAME_SIZE,
            ((format.width as u64) << 32) | format.height as u64,
        ),
        (MF_MT_FRAME_RATE, rate),
        (MF_MT_FRAME_RATE_RANGE_MIN, rate),
        (MF_MT_FRAME_RATE_RANGE_MAX, rate),
    ]
}

fn split_u64(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, packed as u32)
}

/// An activated device source plus the reader pulling its first video stream.
pub struct MediaFoundationSession {
    source: IMFMediaSource,
    reader: IMFSourceReader,
    closed: bool,
}

impl MediaFoundationSession {
    pub(super) unsafe fn new(source: IMFMediaSource) -> Result<Self, ProviderError> {
        let reader = match MFCreateSourceReaderFromMediaSource(&source, None::<&IMFAttributes>) {
            Ok(reader) => reader,
            Err(e) => {
                let _ = source.Shutdown();
                return Err(mf_error(
                    ProviderErrorKind::Other,
                    "MFCreateSourceReaderFromMediaSource failed",
                    e,
                ));
            }
        };

        Ok(Self {
            source,
            reader,
            closed: false,
        })
    }

    unsafe fn build_media_type(format: &NativeFormat) -> windows::core::Result<IMFMediaType> {
        let media_type = MFCreateMediaType()?;
        match format.major_type {
            MajorType::Video => media_type.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Video)?,
        }
        media_type.SetGUID(&MF_MT_SUBTYPE, &subtype_guid(format.subtype))?;
        for (key, value) in size_and_rate_attributes(format) {
            media_type.SetUINT64(&key, value)?;
        }
        Ok(media_type)
    }

    unsafe fn describe(media_type: &IMFMediaType) -> windows::core::Result<NativeFormatInfo> {
        let subtype = media_type.GetGUID(&MF_MT_SUBTYPE)?;
        let (width, height) = split_u64(media_type.GetUINT64(&MF_MT_FRAME_SIZE)?);
        let nominal = FrameRateRatio::unpack(media_type.GetUINT64(&MF_MT_FRAME_RATE)?);
        // Not every driver publishes a range; fall back to the nominal rate.
        let min = media_type
            .GetUINT64(&MF_MT_FRAME_RATE_RANGE_MIN)
            .map(FrameRateRatio::unpack)
            .unwrap_or(nominal);
        let max = media_type
            .GetUINT64(&MF_MT_FRAME_RATE_RANGE_MAX)
            .map(FrameRateRatio::unpack)
            .unwrap_or(nominal);

        Ok(NativeFormatInfo {
            subtype: FourCc::from_u32(subtype.data1),
            width,
            height,
            min_rate: min,
            nominal_rate: nominal,
            max_rate: max,
        })
    }

    unsafe fn copy_sample(sample: &IMFSample) -> Result<Bytes, ProviderError> {
        let buffer = sample
            .ConvertToContiguousBuffer()
            .map_err(|e| mf_error(ProviderErrorKind::Other, "ConvertToContiguousBuffer failed", e))?;

        let mut data: *mut u8 = std::ptr::null_mut();
        let mut current = 0u32;
        buffer
            .Lock(&mut data, None, Some(&mut current))
            .map_err(|e| mf_error(ProviderErrorKind::Other, "IMFMediaBuffer::Lock failed", e))?;

        let bytes = if data.is_null() {
            Bytes::new()
        } else {
            Bytes::copy_from_slice(std::slice::from_raw_parts(data, current as usize))
        };
        let _ = buffer.Unlock();
        Ok(bytes)
    }
}

impl ProviderSession for MediaFoundationSession {
    fn apply_format(&mut self, format: &NativeFormat) -> Result<(), ProviderError> {
        unsafe {
            let media_type = Self::build_media_type(format).map_err(|e| {
                mf_error(ProviderErrorKind::Unsupported, "Failed to build media type", e)
            })?;
            self.reader
                .SetCurrentMediaType(VIDEO_STREAM, None, &media_type)
                .map_err(|e| mf_error(ProviderErrorKind::Rejected, "SetCurrentMediaType failed", e))
        }
    }

    fn query_native_format(
        &mut self,
        index: usize,
    ) -> Result<Option<NativeFormatInfo>, ProviderError> {
        unsafe {
            let media_type = match self.reader.GetNativeMediaType(VIDEO_STREAM, index as u32) {
                Ok(media_type) => media_type,
                Err(e) if e.code() == MF_E_NO_MORE_TYPES => return Ok(None),
                Err(e) => {
                    return Err(mf_error(
                        ProviderErrorKind::Other,
                        "GetNativeMediaType failed",
                        e,
                    ))
                }
            };
            Self::describe(&media_type)
                .map(Some)
                .map_err(|e| mf_error(ProviderErrorKind::Other, "Incomplete native media type", e))
        }
    }

    fn read_sample(&mut self) -> Result<Bytes, ProviderError> {
        unsafe {
            loop {
                let mut stream_index = 0u32;
                let mut flags = 0u32;
                let mut timestamp = 0i64;
                let mut sample: Option<IMFSample> = None;

                self.reader
                    .ReadSample(
                        VIDEO_STREAM,
                        0,
                        Some(&mut stream_index),
                        Some(&mut flags),
                        Some(&mut timestamp),
                        Some(&mut sample),
                    )
                    .map_err(|e| mf_error(ProviderErrorKind::StreamFault, "ReadSample failed", e))?;

                let flags = flags as i32;
                if flags & MF_SOURCE_READERF_ERROR.0 != 0 {
                    return Err(ProviderError::stream_fault("source reader reported an error"));
                }
                if flags & MF_SOURCE_READERF_ENDOFSTREAM.0 != 0 {
                    return Err(ProviderError::stream_fault("end of stream"));
                }

                // Stream ticks and format changes arrive without a sample.
                if let Some(sample) = sample {
                    return Self::copy_sample(&sample);
                }
            }
        }
    }

    fn control_interface(
        &mut self,
        group: ControlGroup,
    ) -> Result<Box<dyn ControlInterface>, ProviderError> {
        let unavailable =
            |e| mf_error(ProviderErrorKind::Unavailable, "control interface not exposed", e);
        match group {
            ControlGroup::ImageProcessing => {
                let amp = self.source.cast::<IAMVideoProcAmp>().map_err(unavailable)?;
                Ok(Box::new(VideoProcAmpInterface::new(amp)))
            }
            ControlGroup::Camera => {
                let camera = self.source.cast::<IAMCameraControl>().map_err(unavailable)?;
                Ok(Box::new(CameraControlInterface::new(camera)))
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        unsafe {
            if let Err(e) = self.source.Shutdown() {
                log::warn!("IMFMediaSource::Shutdown failed: {}", e);
            }
        }
    }
}
