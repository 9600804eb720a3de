//! Native windowing library abstraction
//!
//! The native library (GLFW, or the in-memory headless platform) is only ever
//! touched from one OS thread. These traits are the whole surface the rest of
//! the crate needs from it:
//!
//! - [`Platform`]: library init/terminate and window creation
//! - [`NativeWindow`]: operations on the primary window, executed by the run loop
//! - [`LoaderContext`]: the secondary context owned by the loader thread
//!
//! Native callbacks come back as [`RawEvent`] values from
//! [`NativeWindow::poll_events`]; the translator is the only consumer.
//!
//! # Thread Safety
//! `NativeWindow` is deliberately not `Send`. It lives on the run loop's stack
//! and is lent to main-thread work items, never shared.

pub mod headless;
#[cfg(feature = "glfw")]
pub mod glfw;

use crate::input::{Key, MouseButton};
use crate::props::Props;
use thiserror::Error;

/// Native library errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The library could not be initialized
    #[error("Native library initialization failed: {0}")]
    InitializationFailed(String),

    /// A window or context could not be created
    #[error("Native window creation failed: {0}")]
    CreationFailed(String),

    /// An individual call failed
    #[error("Native call failed: {0}")]
    CallFailed(String),

    /// The library has not been initialized
    #[error("Native library is not initialized")]
    NotInitialized,
}

/// Result alias for native calls
pub type NativeResult<T> = Result<T, NativeError>;

/// Monitor video mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoMode {
    /// Width in screen coordinates
    pub width: i32,
    /// Height in screen coordinates
    pub height: i32,
}

/// Buffer swap synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapInterval {
    /// No vertical sync
    Immediate,
    /// Standard vertical sync
    Sync,
    /// Sync unless the frame is late (swap-control-tear)
    Adaptive,
}

/// One mutation of the primary native window
#[derive(Debug, Clone, PartialEq)]
pub enum NativeOp {
    /// Set the title text
    SetTitle(String),
    /// Resize the window
    SetSize {
        /// Width
        width: i32,
        /// Height
        height: i32,
    },
    /// Move the window
    SetPosition {
        /// X position
        x: i32,
        /// Y position
        y: i32,
    },
    /// Warp the cursor
    SetCursorPosition {
        /// X position
        x: f64,
        /// Y position
        y: f64,
    },
    /// Show the window
    Show,
    /// Hide the window
    Hide,
    /// Minimize the window
    Iconify,
    /// Restore the window from minimized
    Restore,
    /// Change the swap interval of the current context
    SetSwapInterval(SwapInterval),
    /// Capture (true) or release (false) the cursor
    SetCursorGrabbed(bool),
    /// Replace the clipboard contents
    SetClipboard(String),
}

/// Key or button action reported by the native library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Pressed
    Press,
    /// Released
    Release,
    /// Held long enough to auto-repeat
    Repeat,
}

/// A native callback, as delivered by the library
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// The user asked to close the window
    Close,
    /// Contents need redrawing
    Refresh,
    /// Minimized (true) or restored (false)
    Iconify(bool),
    /// Focus gained (true) or lost (false)
    Focus(bool),
    /// Window moved
    Position(i32, i32),
    /// Window resized
    Size(i32, i32),
    /// Framebuffer resized
    FramebufferSize(i32, i32),
    /// Paths dropped onto the window
    FileDrop(Vec<String>),
    /// Raw cursor position
    CursorPosition(f64, f64),
    /// Cursor entered (true) or left (false)
    CursorEnter(bool),
    /// Unicode character input
    Char(char),
    /// Key transition
    Key {
        /// Key code
        key: Key,
        /// Platform scancode
        scancode: i32,
        /// Action
        action: Action,
    },
    /// Mouse button transition
    MouseButton {
        /// Button
        button: MouseButton,
        /// Action
        action: Action,
    },
    /// Scroll offset
    Scroll(f64, f64),
}

/// The primary native window and its rendering context
pub trait NativeWindow {
    /// Perform one mutation
    fn apply(&mut self, op: &NativeOp) -> NativeResult<()>;

    /// Current video mode of the primary monitor
    fn primary_video_mode(&mut self) -> Option<VideoMode>;

    /// Whether the context supports adaptive vsync (swap-control-tear)
    fn adaptive_vsync_supported(&mut self) -> bool;

    /// Current clipboard contents
    fn clipboard(&mut self) -> Option<String>;

    /// Present the back buffer
    fn swap_buffers(&mut self);

    /// Pump the native event queue, appending translated callbacks to `events`
    fn poll_events(&mut self, events: &mut Vec<RawEvent>);

    /// Destroy the window
    fn destroy(self) -> NativeResult<()>
    where
        Self: Sized;
}

/// Secondary context shared with the primary window, owned by the loader thread
pub trait LoaderContext: Send + 'static {
    /// Make the context current on the calling thread
    fn make_current(&mut self) -> NativeResult<()>;

    /// Release the context from the calling thread
    fn detach(&mut self);

    /// Destroy the context; it must not be current anywhere
    fn destroy(self) -> NativeResult<()>
    where
        Self: Sized;
}

/// The primary window plus the hidden loader context sharing its objects
pub struct Surfaces<W, L> {
    /// Primary window, context current on the creating thread
    pub window: W,
    /// Loader context, not current anywhere
    pub loader: L,
}

/// A native windowing library
///
/// Every method must be called from the thread that will run the main loop.
pub trait Platform {
    /// Primary window type
    type Window: NativeWindow;
    /// Loader context type
    type Loader: LoaderContext;

    /// Initialize the library
    fn init(&mut self) -> NativeResult<()>;

    /// Create the primary window and its shared loader context from `props`
    ///
    /// The window starts hidden; the first reconcile shows it.
    fn create_surfaces(&mut self, props: &Props) -> NativeResult<Surfaces<Self::Window, Self::Loader>>;

    /// Tear the library down, restoring global state such as video modes
    fn terminate(&mut self);
}

/// Owner of a native library's global initialization state
///
/// `ensure_initialized` and `shutdown` are idempotent; dropping the value
/// shuts the library down, so it is also terminated while unwinding.
pub struct NativeLibrary<P: Platform> {
    platform: P,
    initialized: bool,
}

impl<P: Platform> NativeLibrary<P> {
    /// Wrap an uninitialized platform
    pub fn new(platform: P) -> Self {
        Self { platform, initialized: false }
    }

    /// Initialize the library if needed and return it
    pub fn ensure_initialized(&mut self) -> NativeResult<&mut P> {
        if !self.initialized {
            self.platform.init()?;
            self.initialized = true;
            log::info!("Native library initialized");
        }
        Ok(&mut self.platform)
    }

    /// Whether the library is currently initialized
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Terminate the library if it is initialized
    pub fn shutdown(&mut self) {
        if self.initialized {
            self.platform.terminate();
            self.initialized = false;
            log::info!("Native library terminated");
        }
    }
}

impl<P: Platform> Drop for NativeLibrary<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::headless::{HeadlessPlatform, LifecycleEvent};
    use super::*;

    #[test]
    fn test_library_init_and_shutdown_are_idempotent() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let mut library = NativeLibrary::new(platform);

        library.ensure_initialized().unwrap();
        library.ensure_initialized().unwrap();
        assert!(library.is_initialized());

        library.shutdown();
        library.shutdown();
        drop(library);

        assert_eq!(probe.count(&LifecycleEvent::Initialized), 1);
        assert_eq!(probe.count(&LifecycleEvent::Terminated), 1);
    }

    #[test]
    fn test_drop_terminates_initialized_library() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();
        {
            let mut library = NativeLibrary::new(platform);
            library.ensure_initialized().unwrap();
        }
        assert_eq!(probe.count(&LifecycleEvent::Terminated), 1);
    }

    #[test]
    fn test_failed_init_is_not_terminated() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();
        probe.fail_init(true);

        let mut library = NativeLibrary::new(platform);
        assert!(matches!(library.ensure_initialized(), Err(NativeError::InitializationFailed(_))));
        drop(library);

        assert_eq!(probe.count(&LifecycleEvent::Terminated), 0);
    }
}
