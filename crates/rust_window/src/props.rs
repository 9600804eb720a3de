//! Window properties
//!
//! [`Props`] is a plain value describing how a window should look and behave.
//! Applications read the current value with `Window::props`, change a copy and
//! hand it back with `Window::request`.
//!
//! Two copies are tracked per window in [`PropertyState`]: what the application
//! last asked for (`requested`) and what the native window is known to be
//! (`last`). The reconciler diffs the two; the event translator keeps `last`
//! honest when the user changes the window behind our back.

use crate::config::{Config, Deserialize, Serialize};

/// Framebuffer format requested at window creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Precision {
    /// Red channel bits
    pub red_bits: u8,
    /// Green channel bits
    pub green_bits: u8,
    /// Blue channel bits
    pub blue_bits: u8,
    /// Alpha channel bits
    pub alpha_bits: u8,
    /// Depth buffer bits
    pub depth_bits: u8,
    /// Stencil buffer bits
    pub stencil_bits: u8,
    /// Multisample count (0 disables multisampling)
    pub samples: u8,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            red_bits: 8,
            green_bits: 8,
            blue_bits: 8,
            alpha_bits: 0,
            depth_bits: 24,
            stencil_bits: 0,
            samples: 4,
        }
    }
}

/// Window properties
///
/// Size and position are in screen coordinates. A position of
/// `(UNSET_POS, UNSET_POS)` centers the window on the primary monitor, and a
/// cursor position with an `UNSET_CURSOR` axis leaves the cursor alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Props {
    /// Title; the first `{FPS}` is replaced with the measured frame rate
    pub title: String,
    /// Window size
    pub size: (i32, i32),
    /// Window position
    pub pos: (i32, i32),
    /// Cursor position relative to the window
    pub cursor_pos: (f64, f64),
    /// Whether the window is shown
    pub visible: bool,
    /// Whether the window is minimized
    pub minimized: bool,
    /// Whether the window has input focus (observed only)
    pub focused: bool,
    /// Whether the user may resize the window (creation only)
    pub resizable: bool,
    /// Whether the window has decorations (creation only)
    pub decorated: bool,
    /// Whether the window floats above others (creation only)
    pub always_on_top: bool,
    /// Vertical sync
    pub vsync: bool,
    /// Whether the cursor is hidden and captured for relative motion
    pub cursor_grabbed: bool,
    /// Framebuffer format (creation only)
    pub precision: Precision,
    /// Fullscreen on the primary monitor (creation only)
    pub fullscreen: bool,
    /// Framebuffer size in pixels (observed only)
    pub framebuffer_size: (i32, i32),
    /// Whether a close request from the user closes the window
    ///
    /// When false, a `Close` event is sent instead and the application decides.
    pub should_close: bool,
}

impl Props {
    /// Position sentinel; both axes set to it centers the window
    pub const UNSET_POS: i32 = -1;

    /// Cursor sentinel; either axis set to it leaves the cursor alone
    pub const UNSET_CURSOR: f64 = -1.0;

    /// Create the default property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the size
    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.size = (width, height);
        self
    }

    /// Set the position
    pub fn with_pos(mut self, x: i32, y: i32) -> Self {
        self.pos = (x, y);
        self
    }

    /// Set fullscreen mode
    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    /// Whether the position asks for centering on the primary monitor
    pub fn is_centered(&self) -> bool {
        self.pos == (Self::UNSET_POS, Self::UNSET_POS)
    }

    /// Whether a concrete cursor position is set
    #[allow(clippy::float_cmp)]
    pub fn has_cursor_pos(&self) -> bool {
        self.cursor_pos.0 != Self::UNSET_CURSOR && self.cursor_pos.1 != Self::UNSET_CURSOR
    }
}

impl Default for Props {
    fn default() -> Self {
        Self {
            title: "rust_window - {FPS}".to_string(),
            size: (800, 450),
            pos: (Self::UNSET_POS, Self::UNSET_POS),
            cursor_pos: (Self::UNSET_CURSOR, Self::UNSET_CURSOR),
            visible: true,
            minimized: false,
            focused: true,
            resizable: true,
            decorated: true,
            always_on_top: false,
            vsync: true,
            cursor_grabbed: false,
            precision: Precision::default(),
            fullscreen: false,
            framebuffer_size: (1, 1),
            should_close: true,
        }
    }
}

impl Config for Props {}

/// Requested and last-applied properties of one window
///
/// Guarded by a single lock: readers see both copies consistently, and the
/// reconciler and event translator are the only writers.
#[derive(Debug, Clone)]
pub struct PropertyState {
    /// What the application last asked for
    pub requested: Props,
    /// What the native window is known to be
    pub last: Props,
    /// Previous raw cursor sample while grabbed; `None` right after (re)grab
    pub(crate) cursor_baseline: Option<(f64, f64)>,
    /// Title text most recently sent to the native window
    pub(crate) applied_title: Option<String>,
}

impl PropertyState {
    /// Create state for a window about to be configured with `requested`
    ///
    /// `last` starts at the defaults; the first forced reconcile overwrites it.
    pub fn new(requested: Props) -> Self {
        Self {
            requested,
            last: Props::default(),
            cursor_baseline: None,
            applied_title: None,
        }
    }
}
