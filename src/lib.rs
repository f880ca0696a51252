//! vidcap: capture-device backend
//!
//! Enumerates video capture devices, negotiates a pixel format, resolution
//! and frame rate, streams raw encoded frames on demand and reads or writes
//! a fixed set of camera controls.
//!
//! # Features
//! - One lifecycle state machine over any platform provider
//! - Native format enumeration with low/typical/high frame-rate tiers
//! - Camera controls routed to image-processing or camera interfaces
//! - Media Foundation on Windows, V4L2 on Linux (`v4l2` feature)
//! - Callback capture on a worker thread with a stop flag
//! - Deterministic in-memory provider for tests and demos
//!
//! # Usage
//! ```rust
//! use vidcap::testing::{MockDevice, MockProvider};
//! use vidcap::Subsystem;
//!
//! let provider = MockProvider::new().with_device(MockDevice::usb_camera());
//! let subsystem = Subsystem::startup(provider).unwrap();
//!
//! let mut device = subsystem.device(0);
//! device.init(None).unwrap();
//! device.open_stream().unwrap();
//! let frame = device.read_frame().unwrap();
//! assert!(!frame.is_empty());
//! device.close_stream();
//! ```
pub mod config;
pub mod controls;
pub mod device;
pub mod enumerator;
pub mod errors;
pub mod negotiator;
pub mod platform;
pub mod provider;
pub mod session;
pub mod subsystem;
pub mod threaded;
pub mod types;

// Testing utilities - in-memory provider for offline use
pub mod testing;

// Re-exports for convenience
pub use controls::{ControlGroup, ControlKind, ControlMode, ControlState};
pub use device::{CaptureDevice, DeviceState};
pub use errors::{CaptureError, ErrorKind};
pub use negotiator::FormatRequest;
pub use subsystem::Subsystem;
pub use threaded::CallbackCapture;
pub use types::{DeviceDescriptor, FormatSpec, Frame, FrameEncoding, Platform, Resolution};

/// Detect the current platform using the Platform enum
pub fn current_platform() -> Platform {
    Platform::current()
}

/// Initialize logging for the capture system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "vidcap=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        platform: Platform::current(),
        native_provider: platform::HAS_NATIVE_PROVIDER,
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub platform: Platform,
    pub native_provider: bool,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        let platform = current_platform();
        assert_ne!(platform, Platform::Unknown);
    }

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "vidcap");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
    }
}
