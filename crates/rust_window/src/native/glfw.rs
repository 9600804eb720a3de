//! GLFW native platform
//!
//! Creates a hidden 32x32 window whose OpenGL context backs the loader, then
//! the primary window sharing objects with it. Both `PWindow`s stay on the
//! main thread; the loader thread only receives the hidden window's render
//! context, which GLFW allows to be made current elsewhere.
//!
//! GLFW is terminated once the last `Glfw` handle is dropped, so
//! [`Platform::terminate`] releases the platform's handle and the window
//! releases its clone in [`NativeWindow::destroy`].

use super::{
    Action, LoaderContext, NativeError, NativeOp, NativeResult, NativeWindow, Platform, RawEvent,
    Surfaces, SwapInterval, VideoMode,
};
use crate::input::{Key, MouseButton};
use crate::props::Props;
use crate::reconcile::render_title;
use glfw::{Context, Glfw, GlfwReceiver, PRenderContext, PWindow, WindowEvent, WindowHint, WindowMode};

type Events = GlfwReceiver<(f64, WindowEvent)>;

const SWAP_CONTROL_TEAR: [&str; 2] = ["WGL_EXT_swap_control_tear", "GLX_EXT_swap_control_tear"];

fn log_glfw_error(err: glfw::Error, description: String) {
    log::error!("GLFW error {err:?}: {description}");
}

fn dimension(value: i32) -> u32 {
    u32::try_from(value.max(1)).unwrap_or(1)
}

/// The GLFW library
#[derive(Default)]
pub struct GlfwPlatform {
    glfw: Option<Glfw>,
}

impl GlfwPlatform {
    /// Create an uninitialized platform
    pub fn new() -> Self {
        Self::default()
    }
}

impl Platform for GlfwPlatform {
    type Window = GlfwWindow;
    type Loader = GlfwLoader;

    fn init(&mut self) -> NativeResult<()> {
        let glfw = glfw::init(log_glfw_error)
            .map_err(|err| NativeError::InitializationFailed(format!("{err:?}")))?;
        self.glfw = Some(glfw);
        Ok(())
    }

    fn create_surfaces(&mut self, props: &Props) -> NativeResult<Surfaces<GlfwWindow, GlfwLoader>> {
        let glfw = self.glfw.as_mut().ok_or(NativeError::NotInitialized)?;

        glfw.window_hint(WindowHint::Visible(false));
        let (mut assets, assets_events) = glfw
            .create_window(32, 32, "assets", WindowMode::Windowed)
            .ok_or_else(|| NativeError::CreationFailed("hidden loader window".to_string()))?;

        let precision = props.precision;
        glfw.window_hint(WindowHint::Visible(false));
        glfw.window_hint(WindowHint::Resizable(props.resizable));
        glfw.window_hint(WindowHint::Decorated(props.decorated));
        glfw.window_hint(WindowHint::AutoIconify(true));
        glfw.window_hint(WindowHint::Floating(props.always_on_top));
        glfw.window_hint(WindowHint::RedBits(Some(u32::from(precision.red_bits))));
        glfw.window_hint(WindowHint::GreenBits(Some(u32::from(precision.green_bits))));
        glfw.window_hint(WindowHint::BlueBits(Some(u32::from(precision.blue_bits))));
        glfw.window_hint(WindowHint::AlphaBits(Some(u32::from(precision.alpha_bits))));
        glfw.window_hint(WindowHint::DepthBits(Some(u32::from(precision.depth_bits))));
        glfw.window_hint(WindowHint::StencilBits(Some(u32::from(precision.stencil_bits))));
        glfw.window_hint(WindowHint::Samples(Some(u32::from(precision.samples))));
        glfw.window_hint(WindowHint::SRgbCapable(true));

        let (width, height) = (dimension(props.size.0), dimension(props.size.1));
        let title = render_title(&props.title, 0.0);
        let created = if props.fullscreen {
            glfw.with_primary_monitor(|_, monitor| match monitor {
                Some(monitor) => assets.create_shared(width, height, &title, WindowMode::FullScreen(&*monitor)),
                None => {
                    log::warn!("No primary monitor; creating a windowed window");
                    assets.create_shared(width, height, &title, WindowMode::Windowed)
                }
            })
        } else {
            assets.create_shared(width, height, &title, WindowMode::Windowed)
        };
        let (mut window, events) =
            created.ok_or_else(|| NativeError::CreationFailed("primary window".to_string()))?;

        window.make_current();
        window.set_all_polling(true);
        log::info!("Created GLFW window {width}x{height}");

        let loader = GlfwLoader { context: assets.render_context() };
        Ok(Surfaces {
            window: GlfwWindow {
                glfw: glfw.clone(),
                window,
                events,
                assets,
                _assets_events: assets_events,
            },
            loader,
        })
    }

    fn terminate(&mut self) {
        self.glfw = None;
    }
}

/// The primary GLFW window
pub struct GlfwWindow {
    glfw: Glfw,
    window: PWindow,
    events: Events,
    assets: PWindow,
    _assets_events: Events,
}

impl NativeWindow for GlfwWindow {
    fn apply(&mut self, op: &NativeOp) -> NativeResult<()> {
        match op {
            NativeOp::SetTitle(title) => self.window.set_title(title),
            NativeOp::SetSize { width, height } => self.window.set_size(*width, *height),
            NativeOp::SetPosition { x, y } => self.window.set_pos(*x, *y),
            NativeOp::SetCursorPosition { x, y } => self.window.set_cursor_pos(*x, *y),
            NativeOp::Show => self.window.show(),
            NativeOp::Hide => self.window.hide(),
            NativeOp::Iconify => self.window.iconify(),
            NativeOp::Restore => self.window.restore(),
            NativeOp::SetSwapInterval(interval) => self.glfw.set_swap_interval(match interval {
                SwapInterval::Immediate => glfw::SwapInterval::None,
                SwapInterval::Sync => glfw::SwapInterval::Sync(1),
                SwapInterval::Adaptive => glfw::SwapInterval::Adaptive,
            }),
            NativeOp::SetCursorGrabbed(grabbed) => self.window.set_cursor_mode(if *grabbed {
                glfw::CursorMode::Disabled
            } else {
                glfw::CursorMode::Normal
            }),
            NativeOp::SetClipboard(text) => self.window.set_clipboard_string(text),
        }
        Ok(())
    }

    fn primary_video_mode(&mut self) -> Option<VideoMode> {
        let mode = self
            .glfw
            .with_primary_monitor(|_, monitor| monitor.and_then(|monitor| monitor.get_video_mode()))?;
        Some(VideoMode {
            width: i32::try_from(mode.width).unwrap_or(i32::MAX),
            height: i32::try_from(mode.height).unwrap_or(i32::MAX),
        })
    }

    fn adaptive_vsync_supported(&mut self) -> bool {
        SWAP_CONTROL_TEAR.iter().any(|ext| self.glfw.extension_supported(ext))
    }

    fn clipboard(&mut self) -> Option<String> {
        self.window.get_clipboard_string()
    }

    fn swap_buffers(&mut self) {
        self.window.swap_buffers();
    }

    fn poll_events(&mut self, events: &mut Vec<RawEvent>) {
        self.glfw.poll_events();
        events.extend(glfw::flush_messages(&self.events).filter_map(|(_, event)| convert_event(event)));
    }

    fn destroy(self) -> NativeResult<()> {
        let Self { glfw, window, assets, .. } = self;
        drop(window);
        drop(assets);
        drop(glfw);
        log::debug!("GLFW windows destroyed");
        Ok(())
    }
}

/// Render context of the hidden loader window
pub struct GlfwLoader {
    context: PRenderContext,
}

impl LoaderContext for GlfwLoader {
    fn make_current(&mut self) -> NativeResult<()> {
        self.context.make_current();
        Ok(())
    }

    fn detach(&mut self) {
        glfw::make_context_current(None);
    }

    fn destroy(self) -> NativeResult<()> {
        // The hidden window itself is destroyed on the main thread.
        drop(self.context);
        Ok(())
    }
}

fn convert_event(event: WindowEvent) -> Option<RawEvent> {
    Some(match event {
        WindowEvent::Close => RawEvent::Close,
        WindowEvent::Refresh => RawEvent::Refresh,
        WindowEvent::Iconify(iconified) => RawEvent::Iconify(iconified),
        WindowEvent::Focus(focused) => RawEvent::Focus(focused),
        WindowEvent::Pos(x, y) => RawEvent::Position(x, y),
        WindowEvent::Size(width, height) => RawEvent::Size(width, height),
        WindowEvent::FramebufferSize(width, height) => RawEvent::FramebufferSize(width, height),
        WindowEvent::FileDrop(paths) => RawEvent::FileDrop(
            paths.iter().map(|path| path.to_string_lossy().into_owned()).collect(),
        ),
        WindowEvent::CursorPos(x, y) => RawEvent::CursorPosition(x, y),
        WindowEvent::CursorEnter(entered) => RawEvent::CursorEnter(entered),
        WindowEvent::Char(ch) => RawEvent::Char(ch),
        WindowEvent::Key(key, scancode, action, _) => RawEvent::Key {
            key: convert_key(key),
            scancode,
            action: convert_action(action),
        },
        WindowEvent::MouseButton(button, action, _) => RawEvent::MouseButton {
            button: convert_button(button),
            action: convert_action(action),
        },
        WindowEvent::Scroll(x, y) => RawEvent::Scroll(x, y),
        _ => return None,
    })
}

fn convert_action(action: glfw::Action) -> Action {
    match action {
        glfw::Action::Press => Action::Press,
        glfw::Action::Release => Action::Release,
        glfw::Action::Repeat => Action::Repeat,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn convert_button(button: glfw::MouseButton) -> MouseButton {
    match button {
        glfw::MouseButton::Button1 => MouseButton::Left,
        glfw::MouseButton::Button2 => MouseButton::Right,
        glfw::MouseButton::Button3 => MouseButton::Middle,
        other => MouseButton::Other(other as i32 as u8 + 1),
    }
}

fn convert_key(key: glfw::Key) -> Key {
    use glfw::Key as G;
    match key {
        G::A => Key::A, G::B => Key::B, G::C => Key::C, G::D => Key::D,
        G::E => Key::E, G::F => Key::F, G::G => Key::G, G::H => Key::H,
        G::I => Key::I, G::J => Key::J, G::K => Key::K, G::L => Key::L,
        G::M => Key::M, G::N => Key::N, G::O => Key::O, G::P => Key::P,
        G::Q => Key::Q, G::R => Key::R, G::S => Key::S, G::T => Key::T,
        G::U => Key::U, G::V => Key::V, G::W => Key::W, G::X => Key::X,
        G::Y => Key::Y, G::Z => Key::Z,
        G::Num0 => Key::Num0, G::Num1 => Key::Num1, G::Num2 => Key::Num2,
        G::Num3 => Key::Num3, G::Num4 => Key::Num4, G::Num5 => Key::Num5,
        G::Num6 => Key::Num6, G::Num7 => Key::Num7, G::Num8 => Key::Num8,
        G::Num9 => Key::Num9,
        G::F1 => Key::F1, G::F2 => Key::F2, G::F3 => Key::F3, G::F4 => Key::F4,
        G::F5 => Key::F5, G::F6 => Key::F6, G::F7 => Key::F7, G::F8 => Key::F8,
        G::F9 => Key::F9, G::F10 => Key::F10, G::F11 => Key::F11, G::F12 => Key::F12,
        G::F13 => Key::F13, G::F14 => Key::F14, G::F15 => Key::F15, G::F16 => Key::F16,
        G::F17 => Key::F17, G::F18 => Key::F18, G::F19 => Key::F19, G::F20 => Key::F20,
        G::F21 => Key::F21, G::F22 => Key::F22, G::F23 => Key::F23, G::F24 => Key::F24,
        G::F25 => Key::F25,
        G::Kp0 => Key::Kp0, G::Kp1 => Key::Kp1, G::Kp2 => Key::Kp2, G::Kp3 => Key::Kp3,
        G::Kp4 => Key::Kp4, G::Kp5 => Key::Kp5, G::Kp6 => Key::Kp6, G::Kp7 => Key::Kp7,
        G::Kp8 => Key::Kp8, G::Kp9 => Key::Kp9,
        G::KpDecimal => Key::KpDecimal,
        G::KpDivide => Key::KpDivide,
        G::KpMultiply => Key::KpMultiply,
        G::KpSubtract => Key::KpSubtract,
        G::KpAdd => Key::KpAdd,
        G::KpEnter => Key::KpEnter,
        G::KpEqual => Key::KpEqual,
        G::Apostrophe => Key::Apostrophe,
        G::Comma => Key::Comma,
        G::Minus => Key::Minus,
        G::Period => Key::Period,
        G::Slash => Key::Slash,
        G::Semicolon => Key::Semicolon,
        G::Equal => Key::Equal,
        G::LeftBracket => Key::LeftBracket,
        G::Backslash => Key::Backslash,
        G::RightBracket => Key::RightBracket,
        G::GraveAccent => Key::GraveAccent,
        G::World1 => Key::World1,
        G::World2 => Key::World2,
        G::Space => Key::Space,
        G::Enter => Key::Enter,
        G::Escape => Key::Escape,
        G::Tab => Key::Tab,
        G::Backspace => Key::Backspace,
        G::Insert => Key::Insert,
        G::Delete => Key::Delete,
        G::Up => Key::Up,
        G::Down => Key::Down,
        G::Left => Key::Left,
        G::Right => Key::Right,
        G::PageUp => Key::PageUp,
        G::PageDown => Key::PageDown,
        G::Home => Key::Home,
        G::End => Key::End,
        G::CapsLock => Key::CapsLock,
        G::ScrollLock => Key::ScrollLock,
        G::NumLock => Key::NumLock,
        G::PrintScreen => Key::PrintScreen,
        G::Pause => Key::Pause,
        G::LeftShift => Key::LeftShift,
        G::RightShift => Key::RightShift,
        G::LeftControl => Key::LeftControl,
        G::RightControl => Key::RightControl,
        G::LeftAlt => Key::LeftAlt,
        G::RightAlt => Key::RightAlt,
        G::LeftSuper => Key::LeftSuper,
        G::RightSuper => Key::RightSuper,
        G::Menu => Key::Menu,
        _ => Key::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(convert_key(glfw::Key::Space), Key::Space);
        assert_eq!(convert_key(glfw::Key::Num7), Key::Num7);
        assert_eq!(convert_key(glfw::Key::KpEnter), Key::KpEnter);
        assert_eq!(convert_key(glfw::Key::PageUp), Key::PageUp);
        assert_eq!(convert_key(glfw::Key::Unknown), Key::Unknown);
    }

    #[test]
    fn test_extra_mouse_buttons_numbered_from_four() {
        assert_eq!(convert_button(glfw::MouseButton::Button1), MouseButton::Left);
        assert_eq!(convert_button(glfw::MouseButton::Button4), MouseButton::Other(4));
    }

    #[test]
    fn test_unhandled_events_are_skipped() {
        assert_eq!(convert_event(WindowEvent::Maximize(true)), None);
        assert_eq!(convert_event(WindowEvent::Scroll(0.0, -1.0)), Some(RawEvent::Scroll(0.0, -1.0)));
    }
}
