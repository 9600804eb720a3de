//! Rendering backend capabilities
//!
//! The window core does not render. It needs three things from a backend:
//! a queue of jobs to execute on the thread owning a context, a way to release
//! the backend's resources, and (for the primary renderer) drawable bounds and
//! a frame rate. [`Device`] and [`Renderer`] are those capabilities;
//! [`Backend`] creates one renderer for the main context and one device for
//! the loader context.
//!
//! [`QueueBackend`] is the stock implementation: a renderer whose work is
//! plain closures, run with the right context current.

use crate::foundation::time::FrameClock;
use crossbeam_channel::{bounded, never, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A job executed on the thread owning a device's context
///
/// Returns true when it finished a frame, which makes the run loop swap
/// buffers and poll events.
pub type Job = Box<dyn FnOnce() -> bool + Send + 'static>;

/// Device errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not be created
    #[error("Device creation failed: {0}")]
    CreationFailed(String),

    /// The device was already released
    #[error("Device has been released")]
    Released,

    /// Releasing resources failed
    #[error("Device release failed: {0}")]
    ReleaseFailed(String),
}

/// Drawable area in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl Bounds {
    /// Bounds anchored at the origin
    pub fn from_size(width: i32, height: i32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// A backend bound to one native context
pub trait Device: Send + Sync + 'static {
    /// Jobs that must run with this device's context current
    fn exec_queue(&self) -> Receiver<Job>;

    /// Free the device's resources; called with its context current
    fn release(&self) -> Result<(), DeviceError>;
}

/// The device bound to the primary window
pub trait Renderer: Device {
    /// The drawable area changed
    fn update_bounds(&self, bounds: Bounds);

    /// Current drawable area
    fn bounds(&self) -> Bounds;

    /// Measured frames per second
    fn frame_rate(&self) -> f64;
}

/// Factory for a renderer and its loader device
pub trait Backend: Send + Sync + 'static {
    /// Primary renderer type, handed to the application
    type Renderer: Renderer;
    /// Loader device type
    type Loader: Device;

    /// Create the renderer; called on the main thread with its context current
    fn create_renderer(&self, bounds: Bounds) -> Result<Self::Renderer, DeviceError>;

    /// Create the loader device; called on the loader thread with its context current
    fn create_loader(&self) -> Result<Self::Loader, DeviceError>;
}

/// Stock backend executing closures
pub struct QueueBackend {
    capacity: usize,
    loader_tx: Sender<Job>,
    loader_rx: Receiver<Job>,
}

impl Default for QueueBackend {
    fn default() -> Self {
        Self::new(32)
    }
}

impl QueueBackend {
    /// Create a backend whose queues hold `capacity` pending jobs
    pub fn new(capacity: usize) -> Self {
        let (loader_tx, loader_rx) = bounded(capacity.max(1));
        Self { capacity: capacity.max(1), loader_tx, loader_rx }
    }
}

impl Backend for QueueBackend {
    type Renderer = QueueRenderer;
    type Loader = QueueDevice;

    fn create_renderer(&self, bounds: Bounds) -> Result<QueueRenderer, DeviceError> {
        let (render_tx, render_rx) = bounded(self.capacity);
        Ok(QueueRenderer {
            render_tx,
            render_rx: Mutex::new(Some(render_rx)),
            loader_tx: self.loader_tx.clone(),
            bounds: RwLock::new(bounds),
            clock: Arc::new(Mutex::new(FrameClock::new())),
            released: AtomicBool::new(false),
        })
    }

    fn create_loader(&self) -> Result<QueueDevice, DeviceError> {
        Ok(QueueDevice {
            rx: Mutex::new(Some(self.loader_rx.clone())),
            released: AtomicBool::new(false),
        })
    }
}

/// Renderer executing closures on the main thread
pub struct QueueRenderer {
    render_tx: Sender<Job>,
    render_rx: Mutex<Option<Receiver<Job>>>,
    loader_tx: Sender<Job>,
    bounds: RwLock<Bounds>,
    clock: Arc<Mutex<FrameClock>>,
    released: AtomicBool,
}

impl QueueRenderer {
    /// Draw a frame on the main thread
    ///
    /// Blocks while the queue is full, which paces the caller to the display.
    pub fn render<F>(&self, frame: F) -> Result<(), DeviceError>
    where
        F: FnOnce() + Send + 'static,
    {
        let clock = Arc::clone(&self.clock);
        self.submit(Box::new(move || {
            frame();
            clock.lock().tick();
            true
        }))
    }

    /// Run non-drawing work on the main thread with the primary context current
    pub fn execute<F>(&self, work: F) -> Result<(), DeviceError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(move || {
            work();
            false
        }))
    }

    /// Run resource preparation on the loader thread with the loader context current
    pub fn load<F>(&self, work: F) -> Result<(), DeviceError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.released.load(Ordering::Acquire) {
            return Err(DeviceError::Released);
        }
        self.loader_tx
            .send(Box::new(move || {
                work();
                false
            }))
            .map_err(|_| DeviceError::Released)
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.clock.lock().frame_count()
    }

    fn submit(&self, job: Job) -> Result<(), DeviceError> {
        if self.released.load(Ordering::Acquire) {
            return Err(DeviceError::Released);
        }
        self.render_tx.send(job).map_err(|_| DeviceError::Released)
    }
}

impl Device for QueueRenderer {
    fn exec_queue(&self) -> Receiver<Job> {
        self.render_rx.lock().clone().unwrap_or_else(never)
    }

    fn release(&self) -> Result<(), DeviceError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Err(DeviceError::Released);
        }
        // Dropping the receiver wakes any caller blocked on a full queue.
        let pending = self.render_rx.lock().take().map_or(0, |rx| rx.try_iter().count());
        log::debug!("Renderer released, {pending} pending jobs discarded");
        Ok(())
    }
}

impl Renderer for QueueRenderer {
    fn update_bounds(&self, bounds: Bounds) {
        *self.bounds.write() = bounds;
    }

    fn bounds(&self) -> Bounds {
        *self.bounds.read()
    }

    fn frame_rate(&self) -> f64 {
        self.clock.lock().frame_rate()
    }
}

/// Loader device executing closures on the loader thread
pub struct QueueDevice {
    rx: Mutex<Option<Receiver<Job>>>,
    released: AtomicBool,
}

impl Device for QueueDevice {
    fn exec_queue(&self) -> Receiver<Job> {
        self.rx.lock().clone().unwrap_or_else(never)
    }

    fn release(&self) -> Result<(), DeviceError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Err(DeviceError::Released);
        }
        self.rx.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_job_reports_frame_and_ticks_clock() {
        let backend = QueueBackend::new(4);
        let renderer = backend.create_renderer(Bounds::from_size(800, 600)).unwrap();
        renderer.render(|| {}).unwrap();
        renderer.execute(|| {}).unwrap();

        let queue = renderer.exec_queue();
        let frame = queue.try_recv().unwrap();
        let work = queue.try_recv().unwrap();
        assert!(frame());
        assert!(!work());
        assert_eq!(renderer.frame_count(), 1);
    }

    #[test]
    fn test_load_goes_to_loader_device() {
        let backend = QueueBackend::new(4);
        let renderer = backend.create_renderer(Bounds::default()).unwrap();
        let loader = backend.create_loader().unwrap();

        renderer.load(|| {}).unwrap();
        assert!(renderer.exec_queue().try_recv().is_err());
        assert!(loader.exec_queue().try_recv().is_ok());
    }

    #[test]
    fn test_release_rejects_new_work() {
        let backend = QueueBackend::new(4);
        let renderer = backend.create_renderer(Bounds::default()).unwrap();
        renderer.render(|| {}).unwrap();

        renderer.release().unwrap();
        assert_eq!(renderer.render(|| {}), Err(DeviceError::Released));
        assert_eq!(renderer.release(), Err(DeviceError::Released));
    }

    #[test]
    fn test_bounds_update() {
        let backend = QueueBackend::default();
        let renderer = backend.create_renderer(Bounds::from_size(1, 1)).unwrap();
        renderer.update_bounds(Bounds::from_size(640, 480));
        assert_eq!(renderer.bounds(), Bounds::from_size(640, 480));
    }
}
