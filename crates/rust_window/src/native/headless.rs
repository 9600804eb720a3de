//! In-memory native platform
//!
//! Runs the whole window stack without a display: native operations are
//! recorded in a journal instead of reaching a windowing system, and raw
//! events are injected by hand. Useful for CI and for exercising the run loop
//! in tests.
//!
//! ```rust,no_run
//! use rust_window::native::headless::HeadlessPlatform;
//! use rust_window::native::RawEvent;
//!
//! let platform = HeadlessPlatform::new();
//! let probe = platform.probe();
//! probe.inject(RawEvent::Focus(false));
//! ```

use super::{
    LoaderContext, NativeError, NativeOp, NativeResult, NativeWindow, Platform, RawEvent, Surfaces,
    VideoMode,
};
use crate::props::Props;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

/// Lifecycle steps recorded by the headless platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// `Platform::init`
    Initialized,
    /// `Platform::create_surfaces`
    SurfacesCreated,
    /// Loader context made current
    LoaderAttached,
    /// Loader context released
    LoaderDetached,
    /// Loader context destroyed
    LoaderDestroyed,
    /// Primary window destroyed
    WindowDestroyed,
    /// `Platform::terminate`
    Terminated,
}

struct Journal {
    ops: Vec<NativeOp>,
    lifecycle: Vec<LifecycleEvent>,
    clipboard: Option<String>,
    video_mode: Option<VideoMode>,
    adaptive_vsync: bool,
    fail_init: bool,
    fail_ops: bool,
    swaps: usize,
}

impl Default for Journal {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            lifecycle: Vec::new(),
            clipboard: None,
            video_mode: Some(VideoMode { width: 1920, height: 1080 }),
            adaptive_vsync: false,
            fail_init: false,
            fail_ops: false,
            swaps: 0,
        }
    }
}

/// Observer and controller for a [`HeadlessPlatform`]
///
/// Cheap to clone and `Send`, so tests can hand it to the application thread.
#[derive(Clone)]
pub struct HeadlessProbe {
    journal: Arc<Mutex<Journal>>,
    events: Sender<RawEvent>,
}

impl HeadlessProbe {
    /// Queue a raw event for the next poll
    pub fn inject(&self, event: RawEvent) {
        let _ = self.events.send(event);
    }

    /// Every native operation applied so far
    pub fn ops(&self) -> Vec<NativeOp> {
        self.journal.lock().ops.clone()
    }

    /// Take and clear the recorded operations
    pub fn take_ops(&self) -> Vec<NativeOp> {
        std::mem::take(&mut self.journal.lock().ops)
    }

    /// Every lifecycle step so far, in order
    pub fn lifecycle(&self) -> Vec<LifecycleEvent> {
        self.journal.lock().lifecycle.clone()
    }

    /// How many times `event` was recorded
    pub fn count(&self, event: &LifecycleEvent) -> usize {
        self.journal.lock().lifecycle.iter().filter(|e| *e == event).count()
    }

    /// Number of buffer swaps
    pub fn swaps(&self) -> usize {
        self.journal.lock().swaps
    }

    /// Current clipboard contents
    pub fn clipboard(&self) -> Option<String> {
        self.journal.lock().clipboard.clone()
    }

    /// Set the primary monitor video mode (`None`: no monitor)
    pub fn set_video_mode(&self, mode: Option<VideoMode>) {
        self.journal.lock().video_mode = mode;
    }

    /// Advertise adaptive vsync support
    pub fn set_adaptive_vsync(&self, supported: bool) {
        self.journal.lock().adaptive_vsync = supported;
    }

    /// Make `Platform::init` fail
    pub fn fail_init(&self, fail: bool) {
        self.journal.lock().fail_init = fail;
    }

    /// Make every native operation fail (operations are still recorded)
    pub fn fail_ops(&self, fail: bool) {
        self.journal.lock().fail_ops = fail;
    }

    fn record(&self, event: LifecycleEvent) {
        self.journal.lock().lifecycle.push(event);
    }
}

/// Native platform without a display
pub struct HeadlessPlatform {
    probe: HeadlessProbe,
    events: Receiver<RawEvent>,
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessPlatform {
    /// Create a platform with a 1920x1080 primary monitor
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            probe: HeadlessProbe { journal: Arc::new(Mutex::new(Journal::default())), events: tx },
            events: rx,
        }
    }

    /// Handle for observing and driving this platform
    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }
}

impl Platform for HeadlessPlatform {
    type Window = HeadlessWindow;
    type Loader = HeadlessLoader;

    fn init(&mut self) -> NativeResult<()> {
        if self.probe.journal.lock().fail_init {
            return Err(NativeError::InitializationFailed("headless init disabled".to_string()));
        }
        self.probe.record(LifecycleEvent::Initialized);
        Ok(())
    }

    fn create_surfaces(&mut self, props: &Props) -> NativeResult<Surfaces<HeadlessWindow, HeadlessLoader>> {
        log::debug!("Creating headless window {}x{}", props.size.0, props.size.1);
        self.probe.record(LifecycleEvent::SurfacesCreated);
        Ok(Surfaces {
            window: HeadlessWindow { probe: self.probe.clone(), events: self.events.clone() },
            loader: HeadlessLoader { probe: self.probe.clone() },
        })
    }

    fn terminate(&mut self) {
        self.probe.record(LifecycleEvent::Terminated);
    }
}

/// Headless primary window
pub struct HeadlessWindow {
    probe: HeadlessProbe,
    events: Receiver<RawEvent>,
}

impl NativeWindow for HeadlessWindow {
    fn apply(&mut self, op: &NativeOp) -> NativeResult<()> {
        let mut journal = self.probe.journal.lock();
        journal.ops.push(op.clone());
        if journal.fail_ops {
            return Err(NativeError::CallFailed(format!("{op:?}")));
        }
        if let NativeOp::SetClipboard(text) = op {
            journal.clipboard = Some(text.clone());
        }
        Ok(())
    }

    fn primary_video_mode(&mut self) -> Option<VideoMode> {
        self.probe.journal.lock().video_mode
    }

    fn adaptive_vsync_supported(&mut self) -> bool {
        self.probe.journal.lock().adaptive_vsync
    }

    fn clipboard(&mut self) -> Option<String> {
        self.probe.clipboard()
    }

    fn swap_buffers(&mut self) {
        self.probe.journal.lock().swaps += 1;
    }

    fn poll_events(&mut self, events: &mut Vec<RawEvent>) {
        events.extend(self.events.try_iter());
    }

    fn destroy(self) -> NativeResult<()> {
        self.probe.record(LifecycleEvent::WindowDestroyed);
        Ok(())
    }
}

/// Headless loader context
pub struct HeadlessLoader {
    probe: HeadlessProbe,
}

impl LoaderContext for HeadlessLoader {
    fn make_current(&mut self) -> NativeResult<()> {
        self.probe.record(LifecycleEvent::LoaderAttached);
        Ok(())
    }

    fn detach(&mut self) {
        self.probe.record(LifecycleEvent::LoaderDetached);
    }

    fn destroy(self) -> NativeResult<()> {
        self.probe.record(LifecycleEvent::LoaderDestroyed);
        Ok(())
    }
}
