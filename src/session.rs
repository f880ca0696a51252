use crate::controls::{ControlGroup, ControlKind};
use crate::errors::{CaptureError, Result};
use crate::provider::{CaptureProvider, ControlInterface, ProviderSession, RawControl};
use crate::types::DeviceDescriptor;

/// Live binding between a descriptor and an open provider handle.
///
/// The provider handle is released exactly once, when the session is
/// dropped. Control sub-interfaces are resolved at open time and released
/// before the handle they came from.
pub struct CaptureSession<S: ProviderSession> {
    handle: S,
    descriptor: DeviceDescriptor,
    image: Option<Box<dyn ControlInterface>>,
    camera: Option<Box<dyn ControlInterface>>,
}

impl<S: ProviderSession> CaptureSession<S> {
    pub fn open<P>(provider: &P, descriptor: DeviceDescriptor) -> Result<Self>
    where
        P: CaptureProvider<Session = S>,
    {
        let mut handle = provider
            .open_device(&descriptor.symbolic_reference)
            .map_err(CaptureError::open_failed)?;

        let image = resolve_group(&mut handle, ControlGroup::ImageProcessing);
        let camera = resolve_group(&mut handle, ControlGroup::Camera);

        log::info!(
            "Opened session for {} ({})",
            descriptor.name,
            descriptor.symbolic_reference
        );

        Ok(Self {
            handle,
            descriptor,
            image,
            camera,
        })
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn handle_mut(&mut self) -> &mut S {
        &mut self.handle
    }

    pub fn has_group(&self, group: ControlGroup) -> bool {
        match group {
            ControlGroup::ImageProcessing => self.image.is_some(),
            ControlGroup::Camera => self.camera.is_some(),
        }
    }

    fn interface(&self, kind: ControlKind) -> Result<&dyn ControlInterface> {
        let slot = match kind.group() {
            ControlGroup::ImageProcessing => &self.image,
            ControlGroup::Camera => &self.camera,
        };
        slot.as_deref().ok_or_else(|| {
            CaptureError::ControlReadError(format!(
                "{:?} controls are not available on {}",
                kind.group(),
                self.descriptor.name
            ))
        })
    }

    fn interface_mut(&mut self, kind: ControlKind) -> Result<&mut (dyn ControlInterface + 'static)> {
        let name = &self.descriptor.name;
        let slot = match kind.group() {
            ControlGroup::ImageProcessing => &mut self.image,
            ControlGroup::Camera => &mut self.camera,
        };
        slot.as_deref_mut().ok_or_else(|| {
            CaptureError::ControlWriteError(format!(
                "{:?} controls are not available on {}",
                kind.group(),
                name
            ))
        })
    }

    pub fn read_control(&self, kind: ControlKind) -> Result<RawControl> {
        self.interface(kind)?
            .read(kind)
            .map_err(CaptureError::control_read)
    }

    pub fn write_control(&mut self, kind: ControlKind, value: i32, flags: i32) -> Result<()> {
        self.interface_mut(kind)?
            .write(kind, value, flags)
            .map_err(CaptureError::control_write)
    }
}

impl<S: ProviderSession> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.image = None;
        self.camera = None;
        self.handle.close();
        log::info!("Released session for {}", self.descriptor.name);
    }
}

fn resolve_group<S: ProviderSession>(
    handle: &mut S,
    group: ControlGroup,
) -> Option<Box<dyn ControlInterface>> {
    match handle.control_interface(group) {
        Ok(interface) => Some(interface),
        Err(e) => {
            log::debug!("{:?} control interface unavailable: {}", group, e);
            None
        }
    }
}
