//! Capture on a worker thread.
//!
//! [`CallbackCapture`] runs a [`CaptureDevice`] on its own thread and hands
//! every frame to a callback, keeping the most recent one for polling.
//! `read_frame` blocks until the provider delivers a sample; `stop` sets a
//! flag the worker checks between frames, so it returns after at most one
//! more read.

use crate::device::CaptureDevice;
use crate::errors::{CaptureError, Result};
use crate::provider::CaptureProvider;
use crate::types::{FormatSpec, Frame};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

type FrameCallback = Box<dyn FnMut(&Frame) + Send + 'static>;

#[derive(Default)]
struct Shared {
    streaming: AtomicBool,
    stop_flag: AtomicBool,
    frames: AtomicU64,
    last_frame: Mutex<Option<Frame>>,
    last_error: Mutex<Option<CaptureError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct CallbackCapture {
    shared: Arc<Shared>,
    format: FormatSpec,
    worker: Option<JoinHandle<()>>,
}

impl CallbackCapture {
    /// Opens a device on a new worker thread and streams into `callback`.
    ///
    /// `open` runs on the worker and should start the subsystem and pick
    /// the device there, so thread-affine providers are started, used and
    /// shut down on a single thread. Returns once the stream is open, or
    /// with the error that kept it from opening.
    pub fn open_stream<P, F, C>(open: F, callback: C) -> Result<Self>
    where
        P: CaptureProvider + 'static,
        F: FnOnce() -> Result<CaptureDevice<P>> + Send + 'static,
        C: FnMut(&Frame) + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let callback: FrameCallback = Box::new(callback);
        let (ready_tx, ready_rx) = bounded::<Result<FormatSpec>>(1);

        let worker = std::thread::Builder::new()
            .name("vidcap-capture".to_string())
            .spawn(move || {
                let opened = open().and_then(|mut device| {
                    device.open_stream()?;
                    Ok(device)
                });
                let mut device = match opened {
                    Ok(device) => device,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                worker_shared.streaming.store(true, Ordering::SeqCst);
                let _ = ready_tx.send(Ok(device.get_format()));
                capture_loop(&mut device, &worker_shared, callback);
            })
            .map_err(|e| {
                CaptureError::DeviceOpenFailed(format!("failed to spawn capture thread: {e}"))
            })?;

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                log::info!("Capture thread streaming at {}", format);
                Ok(Self {
                    shared,
                    format,
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(CaptureError::DeviceOpenFailed(
                    "capture thread exited before the stream opened".to_string(),
                ))
            }
        }
    }

    /// Format the stream was opened with.
    pub fn format(&self) -> FormatSpec {
        self.format
    }

    /// False once `stop` was called or the worker hit a read error.
    pub fn is_streaming(&self) -> bool {
        self.shared.streaming.load(Ordering::SeqCst)
    }

    pub fn frames_delivered(&self) -> u64 {
        self.shared.frames.load(Ordering::SeqCst)
    }

    /// Most recent frame handed to the callback.
    pub fn last_frame(&self) -> Option<Frame> {
        lock(&self.shared.last_frame).clone()
    }

    /// The error that ended the stream, if it did not end through `stop`.
    pub fn last_error(&self) -> Option<CaptureError> {
        lock(&self.shared.last_error).clone()
    }

    /// Stops the worker and waits for it to release the device.
    pub fn stop(&mut self) {
        self.shared.stop_flag.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Capture thread panicked");
                self.shared.streaming.store(false, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for CallbackCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<P: CaptureProvider>(
    device: &mut CaptureDevice<P>,
    shared: &Shared,
    mut callback: FrameCallback,
) {
    while !shared.stop_flag.load(Ordering::SeqCst) {
        match device.read_frame() {
            Ok(frame) => {
                callback(&frame);
                *lock(&shared.last_frame) = Some(frame);
                shared.frames.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                log::warn!("Capture thread for device {} stopped: {}", device.index(), e);
                *lock(&shared.last_error) = Some(e);
                break;
            }
        }
    }

    device.close_stream();
    shared.streaming.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDevice, MockProvider};
    use crate::{ErrorKind, Subsystem};
    use std::time::{Duration, Instant};

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_stop_releases_device_on_worker() {
        let provider = MockProvider::new().with_device(MockDevice::usb_camera());
        let observer = provider.clone();

        let mut capture = CallbackCapture::open_stream(
            move || {
                let subsystem = Subsystem::startup(provider)?;
                Ok(subsystem.device(0))
            },
            |_| {},
        )
        .unwrap();
        assert!(capture.is_streaming());
        assert_eq!(capture.format(), FormatSpec::default());
        assert!(wait_until(|| capture.frames_delivered() >= 2));

        capture.stop();
        assert!(!capture.is_streaming());
        assert!(capture.last_error().is_none());
        assert_eq!(observer.open_sessions(), 0);
        assert_eq!(observer.shutdowns(), 1);

        capture.stop();
        assert_eq!(observer.closes(), 1);
    }

    #[test]
    fn test_worker_fault_is_reported() {
        let provider = MockProvider::new().with_device(MockDevice::usb_camera().fault_after(3));
        let observer = provider.clone();

        let capture = CallbackCapture::open_stream(
            move || Ok(Subsystem::startup(provider)?.device(0)),
            |_| {},
        )
        .unwrap();

        assert!(wait_until(|| !capture.is_streaming()));
        assert_eq!(capture.frames_delivered(), 3);
        assert_eq!(capture.last_frame().map(|f| f.sequence), Some(3));
        assert_eq!(
            capture.last_error().map(|e| e.kind()),
            Some(ErrorKind::FrameRead)
        );
        assert_eq!(observer.open_sessions(), 0);
    }
}
