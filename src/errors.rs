use crate::provider::ProviderError;
use thiserror::Error;

/// Error kinds surfaced by the capture core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Enumeration,
    DeviceIndexOutOfRange,
    DeviceOpenFailed,
    UnsupportedFormat,
    NativeFormatQuery,
    StreamNotOpen,
    FrameRead,
    ControlRead,
    ControlWrite,
    SubsystemInit,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Device enumeration error: {0}")]
    EnumerationError(String),
    #[error("Device index {index} out of range ({available} devices attached)")]
    DeviceIndexOutOfRange { index: usize, available: usize },
    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Native format query error: {0}")]
    NativeFormatQueryError(String),
    #[error("Stream is not open")]
    StreamNotOpen,
    #[error("Frame read error: {0}")]
    FrameReadError(String),
    #[error("Control read error: {0}")]
    ControlReadError(String),
    #[error("Control write error: {0}")]
    ControlWriteError(String),
    #[error("Capture subsystem initialization error: {0}")]
    SubsystemInitError(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::EnumerationError(_) => ErrorKind::Enumeration,
            CaptureError::DeviceIndexOutOfRange { .. } => ErrorKind::DeviceIndexOutOfRange,
            CaptureError::DeviceOpenFailed(_) => ErrorKind::DeviceOpenFailed,
            CaptureError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            CaptureError::NativeFormatQueryError(_) => ErrorKind::NativeFormatQuery,
            CaptureError::StreamNotOpen => ErrorKind::StreamNotOpen,
            CaptureError::FrameReadError(_) => ErrorKind::FrameRead,
            CaptureError::ControlReadError(_) => ErrorKind::ControlRead,
            CaptureError::ControlWriteError(_) => ErrorKind::ControlWrite,
            CaptureError::SubsystemInitError(_) => ErrorKind::SubsystemInit,
            CaptureError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn enumeration(err: ProviderError) -> Self {
        CaptureError::EnumerationError(err.to_string())
    }

    pub(crate) fn open_failed(err: ProviderError) -> Self {
        CaptureError::DeviceOpenFailed(err.to_string())
    }

    pub(crate) fn unsupported_format(err: ProviderError) -> Self {
        CaptureError::UnsupportedFormat(err.to_string())
    }

    pub(crate) fn native_query(err: ProviderError) -> Self {
        CaptureError::NativeFormatQueryError(err.to_string())
    }

    pub(crate) fn frame_read(err: ProviderError) -> Self {
        CaptureError::FrameReadError(err.to_string())
    }

    pub(crate) fn control_read(err: ProviderError) -> Self {
        CaptureError::ControlReadError(err.to_string())
    }

    pub(crate) fn control_write(err: ProviderError) -> Self {
        CaptureError::ControlWriteError(err.to_string())
    }

    pub(crate) fn subsystem_init(err: ProviderError) -> Self {
        CaptureError::SubsystemInitError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderErrorKind;

    #[test]
    fn test_display_includes_message() {
        let err = CaptureError::ControlWriteError("value out of range".to_string());
        assert_eq!(
            err.to_string(),
            "Control write error: value out of range"
        );
    }

    #[test]
    fn test_index_out_of_range_display() {
        let err = CaptureError::DeviceIndexOutOfRange {
            index: 3,
            available: 1,
        };
        assert!(err.to_string().contains("index 3"));
        assert_eq!(err.kind(), ErrorKind::DeviceIndexOutOfRange);
    }

    #[test]
    fn test_provider_error_mapping_keeps_message() {
        let provider = ProviderError::new(ProviderErrorKind::Rejected, "attribute refused");
        let err = CaptureError::unsupported_format(provider);
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(err.to_string().contains("attribute refused"));
    }
}
