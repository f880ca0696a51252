// Windows provider built directly on Media Foundation and the DirectShow control interfaces

pub mod capture;
pub mod controls;

pub use self::capture::MediaFoundationSession;

use crate::provider::{CaptureProvider, ProviderError, ProviderErrorKind};
use crate::types::DeviceDescriptor;
use std::marker::PhantomData;
use std::ptr;
use windows::core::{HSTRING, PWSTR};
use windows::Win32::Media::MediaFoundation::*;
use windows::Win32::System::Com::{
    CoInitializeEx, CoTaskMemFree, CoUninitialize, COINIT_MULTITHREADED,
};

pub(crate) fn mf_error(kind: ProviderErrorKind, context: &str, e: windows::core::Error) -> ProviderError {
    ProviderError::new(kind, format!("{}: {}", context, e))
}

/// Media Foundation capture provider.
///
/// `startup` initializes COM for the calling thread and starts the Media
/// Foundation platform; every successful call is balanced by `shutdown`.
/// COM initialization is per thread, so the provider is neither `Send` nor
/// `Sync`: a [`Subsystem`](crate::Subsystem) over it and every device it
/// creates stay on the thread that started it, and the last drop (which
/// calls `CoUninitialize`) happens there too. To capture on another thread,
/// start the subsystem on that thread, as
/// [`CallbackCapture`](crate::threaded::CallbackCapture) does.
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<vidcap::Subsystem<vidcap::platform::windows::MediaFoundationProvider>>();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaFoundationProvider {
    _apartment: PhantomData<*const ()>,
}

impl MediaFoundationProvider {
    pub fn new() -> Self {
        Self {
            _apartment: PhantomData,
        }
    }
}

/// Video capture device activation objects, freed on drop.
struct DeviceSources {
    ptr: *mut Option<IMFActivate>,
    count: u32,
}

impl DeviceSources {
    fn query() -> Result<Self, ProviderError> {
        unsafe {
            let attributes = video_capture_attributes(None)?;

            let mut ptr: *mut Option<IMFActivate> = ptr::null_mut();
            let mut count = 0u32;
            MFEnumDeviceSources(&attributes, &mut ptr, &mut count).map_err(|e| {
                mf_error(ProviderErrorKind::Unavailable, "MFEnumDeviceSources failed", e)
            })?;

            Ok(Self { ptr, count })
        }
    }

    fn iter(&self) -> impl Iterator<Item = &IMFActivate> {
        (0..self.count as usize).filter_map(move |i| {
            if self.ptr.is_null() {
                return None;
            }
            unsafe { (*self.ptr.add(i)).as_ref() }
        })
    }
}

impl Drop for DeviceSources {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        unsafe {
            for i in 0..self.count as usize {
                ptr::drop_in_place(self.ptr.add(i));
            }
            CoTaskMemFree(Some(self.ptr as *const _));
        }
    }
}

/// Attribute store selecting video capture sources, optionally narrowed to
/// one symbolic link.
unsafe fn video_capture_attributes(symbolic_link: Option<&str>) -> Result<IMFAttributes, ProviderError> {
    let mut attributes: Option<IMFAttributes> = None;
    MFCreateAttributes(&mut attributes, 2)
        .map_err(|e| mf_error(ProviderErrorKind::Other, "MFCreateAttributes failed", e))?;
    let attributes = attributes
        .ok_or_else(|| ProviderError::other("MFCreateAttributes returned no store"))?;

    attributes
        .SetGUID(
            &MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE,
            &MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_GUID,
        )
        .map_err(|e| mf_error(ProviderErrorKind::Other, "Failed to set source type", e))?;

    if let Some(link) = symbolic_link {
        attributes
            .SetString(
                &MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_SYMBOLIC_LINK,
                &HSTRING::from(link),
            )
            .map_err(|e| mf_error(ProviderErrorKind::Other, "Failed to set symbolic link", e))?;
    }

    Ok(attributes)
}

unsafe fn allocated_string(activate: &IMFActivate, key: &windows::core::GUID) -> Option<String> {
    let mut value = PWSTR::null();
    let mut len = 0u32;

    activate.GetAllocatedString(key, &mut value, &mut len).ok()?;
    if value.is_null() {
        return None;
    }
    let text = String::from_utf16_lossy(std::slice::from_raw_parts(value.0, len as usize));
    CoTaskMemFree(Some(value.0 as *const _));
    Some(text)
}

impl CaptureProvider for MediaFoundationProvider {
    type Session = MediaFoundationSession;

    fn name(&self) -> &str {
        "media-foundation"
    }

    fn startup(&self) -> Result<(), ProviderError> {
        unsafe {
            // S_FALSE (already initialized on this thread) is success.
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| mf_error(ProviderErrorKind::Unavailable, "CoInitializeEx failed", e))?;

            if let Err(e) = MFStartup(MF_VERSION, MFSTARTUP_NOSOCKET) {
                CoUninitialize();
                return Err(mf_error(ProviderErrorKind::Unavailable, "MFStartup failed", e));
            }
        }
        log::debug!("Media Foundation started");
        Ok(())
    }

    fn shutdown(&self) {
        unsafe {
            if let Err(e) = MFShutdown() {
                log::warn!("MFShutdown failed: {}", e);
            }
            CoUninitialize();
        }
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, ProviderError> {
        let sources = DeviceSources::query()?;

        let devices = sources
            .iter()
            .enumerate()
            .map(|(index, activate)| unsafe {
                let name = allocated_string(activate, &MF_DEVSOURCE_ATTRIBUTE_FRIENDLY_NAME)
                    .unwrap_or_else(|| format!("Camera {}", index));
                let link = allocated_string(
                    activate,
                    &MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_SYMBOLIC_LINK,
                )
                .unwrap_or_default();
                DeviceDescriptor::new(index, name, link)
            })
            .collect();

        Ok(devices)
    }

    fn open_device(&self, symbolic_reference: &str) -> Result<MediaFoundationSession, ProviderError> {
        unsafe {
            let attributes = video_capture_attributes(Some(symbolic_reference))?;
            let source = MFCreateDeviceSource(&attributes).map_err(|e| {
                mf_error(ProviderErrorKind::Busy, "MFCreateDeviceSource failed", e)
            })?;
            MediaFoundationSession::new(source)
        }
    }
}
