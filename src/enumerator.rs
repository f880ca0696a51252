use crate::errors::{CaptureError, Result};
use crate::provider::CaptureProvider;
use crate::types::DeviceDescriptor;

/// List the video capture devices currently attached.
///
/// Indices are reassigned zero-based in provider order, so they only
/// disambiguate devices within this snapshot. No device is opened.
pub fn enumerate<P: CaptureProvider>(provider: &P) -> Result<Vec<DeviceDescriptor>> {
    let devices = provider
        .enumerate_devices()
        .map_err(CaptureError::enumeration)?;

    let devices: Vec<DeviceDescriptor> = devices
        .into_iter()
        .enumerate()
        .map(|(index, device)| DeviceDescriptor { index, ..device })
        .collect();

    log::debug!(
        "Found {} capture devices using {}",
        devices.len(),
        provider.name()
    );
    Ok(devices)
}
