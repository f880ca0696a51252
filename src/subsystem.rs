//! Process-wide capture subsystem lifetime.
//!
//! [`Subsystem`] is the token that proves the provider has been started.
//! Devices keep a clone of it, so the provider is shut down only once the
//! last token and the last device are gone.

use crate::device::CaptureDevice;
use crate::enumerator;
use crate::errors::{CaptureError, Result};
use crate::provider::CaptureProvider;
use crate::types::DeviceDescriptor;
use std::sync::Arc;

struct Started<P: CaptureProvider> {
    provider: P,
}

impl<P: CaptureProvider> Drop for Started<P> {
    fn drop(&mut self) {
        log::info!("Shutting down capture provider {}", self.provider.name());
        self.provider.shutdown();
    }
}

pub struct Subsystem<P: CaptureProvider> {
    inner: Arc<Started<P>>,
}

impl<P: CaptureProvider> Clone for Subsystem<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: CaptureProvider> Subsystem<P> {
    pub fn startup(provider: P) -> Result<Self> {
        provider.startup().map_err(CaptureError::subsystem_init)?;
        log::info!("Capture provider {} started", provider.name());

        Ok(Self {
            inner: Arc::new(Started { provider }),
        })
    }

    pub fn provider(&self) -> &P {
        &self.inner.provider
    }

    pub fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        enumerator::enumerate(self.provider())
    }

    /// Creates an uninitialized device bound to the given snapshot index.
    pub fn device(&self, index: usize) -> CaptureDevice<P> {
        CaptureDevice::new(self.clone(), index)
    }

    /// Number of live tokens, devices included.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
