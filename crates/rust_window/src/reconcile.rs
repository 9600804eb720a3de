//! Property reconciliation
//!
//! Turns a requested [`Props`] into the smallest list of [`NativeOp`]s that
//! moves the native window from its last known state to the requested one.
//! Planning and applying both happen on the main thread, inside the work item
//! queued by `Window::request`, while the caller holds the property lock.
//!
//! Fields are applied in a fixed order because later ones depend on earlier
//! ones: centering needs the new size, and the cursor grab resets the motion
//! baseline used by the event translator.
//!
//! Focus, resizability, decorations, always-on-top, precision and fullscreen
//! can only be chosen when the window is created. Requests for them are
//! recorded but never reach the native window.

use crate::native::{NativeOp, NativeWindow, SwapInterval, VideoMode};
use crate::props::{Props, PropertyState};

/// Title placeholder replaced with the frame rate
pub const FPS_TOKEN: &str = "{FPS}";

/// Substitute the first `{FPS}` in `template` with e.g. `"60FPS"`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn render_title(template: &str, frame_rate: f64) -> String {
    if !template.contains(FPS_TOKEN) {
        return template.to_string();
    }
    let fps = format!("{}FPS", frame_rate.max(0.0).ceil() as u64);
    template.replacen(FPS_TOKEN, &fps, 1)
}

/// Top-left position that centers a window of `size` on `mode`
pub fn center_position(mode: VideoMode, size: (i32, i32)) -> (i32, i32) {
    (mode.width / 2 - size.0 / 2, mode.height / 2 - size.1 / 2)
}

/// Swap interval for a vsync setting
pub fn swap_interval(vsync: bool, adaptive_supported: bool) -> SwapInterval {
    match (vsync, adaptive_supported) {
        (false, _) => SwapInterval::Immediate,
        (true, true) => SwapInterval::Adaptive,
        (true, false) => SwapInterval::Sync,
    }
}

/// Title operation for the periodic refresh; always issued
pub fn title_op(state: &mut PropertyState, frame_rate: f64) -> NativeOp {
    let title = render_title(&state.requested.title, frame_rate);
    state.applied_title = Some(title.clone());
    NativeOp::SetTitle(title)
}

/// Plan the native operations for `requested`, updating `state` as if they succeed
///
/// With `force` every reconcilable field is applied regardless of `last`.
pub fn plan(
    state: &mut PropertyState,
    requested: &Props,
    force: bool,
    native: &mut dyn NativeWindow,
    frame_rate: f64,
) -> Vec<NativeOp> {
    state.requested = requested.clone();
    let mut ops = Vec::new();

    let title = render_title(&requested.title, frame_rate);
    state.last.title = requested.title.clone();
    if force || state.applied_title.as_deref() != Some(title.as_str()) {
        state.applied_title = Some(title.clone());
        ops.push(NativeOp::SetTitle(title));
    }

    let last = &mut state.last;

    if force || requested.size != last.size {
        last.size = requested.size;
        ops.push(NativeOp::SetSize { width: requested.size.0, height: requested.size.1 });
    }

    if force || requested.pos != last.pos {
        last.pos = requested.pos;
        let (mut x, mut y) = requested.pos;
        if requested.is_centered() {
            match native.primary_video_mode() {
                Some(mode) => (x, y) = center_position(mode, requested.size),
                None => log::debug!("No primary monitor video mode; window left uncentered"),
            }
        }
        ops.push(NativeOp::SetPosition { x, y });
    }

    if force || requested.cursor_pos != last.cursor_pos {
        last.cursor_pos = requested.cursor_pos;
        if requested.has_cursor_pos() {
            let (x, y) = requested.cursor_pos;
            ops.push(NativeOp::SetCursorPosition { x, y });
        }
    }

    if force || requested.visible != last.visible {
        last.visible = requested.visible;
        ops.push(if requested.visible { NativeOp::Show } else { NativeOp::Hide });
    }

    if force || requested.minimized != last.minimized {
        last.minimized = requested.minimized;
        ops.push(if requested.minimized { NativeOp::Iconify } else { NativeOp::Restore });
    }

    if force || requested.vsync != last.vsync {
        last.vsync = requested.vsync;
        let adaptive = requested.vsync && native.adaptive_vsync_supported();
        ops.push(NativeOp::SetSwapInterval(swap_interval(requested.vsync, adaptive)));
    }

    if force || requested.cursor_grabbed != last.cursor_grabbed {
        last.cursor_grabbed = requested.cursor_grabbed;
        state.cursor_baseline = None;
        ops.push(NativeOp::SetCursorGrabbed(requested.cursor_grabbed));
    }

    let last = &mut state.last;
    if !force && (requested.fullscreen != last.fullscreen || requested.precision != last.precision) {
        log::warn!("Fullscreen and precision are fixed at window creation; change ignored");
    }
    last.focused = requested.focused;
    last.resizable = requested.resizable;
    last.decorated = requested.decorated;
    last.always_on_top = requested.always_on_top;
    last.precision = requested.precision;
    last.fullscreen = requested.fullscreen;
    last.should_close = requested.should_close;

    ops
}

/// Execute planned operations in order
///
/// A failed operation is logged and the rest still run. Returns the operations
/// the native window rejected.
pub fn apply<'a>(native: &mut dyn NativeWindow, ops: &'a [NativeOp]) -> Vec<&'a NativeOp> {
    let mut failed = Vec::new();
    for op in ops {
        if let Err(err) = native.apply(op) {
            log::warn!("Native call {op:?} failed: {err}");
            failed.push(op);
        }
    }
    failed
}

/// Restore the bookkeeping for operations that never took effect
///
/// `previous` and `previous_title` are `last` and the applied title as they
/// stood before planning. Re-requesting a reverted value plans it again.
pub fn revert(
    state: &mut PropertyState,
    previous: &Props,
    previous_title: Option<String>,
    failed: &[&NativeOp],
) {
    let last = &mut state.last;
    for op in failed {
        match op {
            NativeOp::SetTitle(_) => {
                last.title.clone_from(&previous.title);
                state.applied_title.clone_from(&previous_title);
            }
            NativeOp::SetSize { .. } => last.size = previous.size,
            NativeOp::SetPosition { .. } => last.pos = previous.pos,
            NativeOp::SetCursorPosition { .. } => last.cursor_pos = previous.cursor_pos,
            NativeOp::Show | NativeOp::Hide => last.visible = previous.visible,
            NativeOp::Iconify | NativeOp::Restore => last.minimized = previous.minimized,
            NativeOp::SetSwapInterval(_) => last.vsync = previous.vsync,
            NativeOp::SetCursorGrabbed(_) => last.cursor_grabbed = previous.cursor_grabbed,
            NativeOp::SetClipboard(_) => {}
        }
    }
}
