//! Concrete capture providers.
//!
//! Media Foundation is always compiled on Windows. The V4L2 provider is
//! opt-in through the `v4l2` feature on Linux. Other targets only have the
//! in-memory provider from [`crate::testing`].

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub mod linux;

#[cfg(target_os = "windows")]
pub type DefaultProvider = windows::MediaFoundationProvider;

#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub type DefaultProvider = linux::V4l2Provider;

/// Whether this build carries a provider for real hardware.
pub const HAS_NATIVE_PROVIDER: bool = cfg!(any(
    target_os = "windows",
    all(target_os = "linux", feature = "v4l2")
));

#[cfg(any(target_os = "windows", all(target_os = "linux", feature = "v4l2")))]
pub fn default_provider() -> DefaultProvider {
    DefaultProvider::new()
}
