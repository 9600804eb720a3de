//! Native callback translation
//!
//! The single point where native callbacks become [`Event`]s. For each raw
//! event the translator first brings shared state up to date (properties,
//! input watchers, renderer bounds) and only then publishes, so a subscriber
//! reacting to an event never observes stale state.

use crate::device::Bounds;
use crate::event::Event;
use crate::input::ButtonState;
use crate::native::{Action, RawEvent};
use crate::window::Shared;
use std::time::Instant;

/// Converts raw native events for one window; main thread only
pub(crate) struct Translator<'a> {
    shared: &'a Shared,
}

impl<'a> Translator<'a> {
    pub(crate) fn new(shared: &'a Shared) -> Self {
        Self { shared }
    }

    /// Translate and publish every event in `raw`
    pub(crate) fn dispatch_all(&self, raw: impl IntoIterator<Item = RawEvent>) {
        for event in raw {
            if let Some(event) = self.translate(event) {
                self.shared.registry.publish(&event);
            }
        }
    }

    /// Update shared state for `raw` and return the event to publish, if any
    pub(crate) fn translate(&self, raw: RawEvent) -> Option<Event> {
        let t = Instant::now();
        let shared = self.shared;

        let event = match raw {
            RawEvent::Close => {
                if shared.state.read().requested.should_close {
                    shared.request_close();
                    return None;
                }
                Event::Close { t }
            }
            RawEvent::Refresh => Event::Damaged { t },
            RawEvent::Iconify(minimized) => {
                let mut state = shared.state.write();
                state.requested.minimized = minimized;
                state.last.minimized = minimized;
                if minimized { Event::Minimized { t } } else { Event::Restored { t } }
            }
            RawEvent::Focus(focused) => {
                let mut state = shared.state.write();
                state.requested.focused = focused;
                state.last.focused = focused;
                if focused { Event::GainedFocus { t } } else { Event::LostFocus { t } }
            }
            RawEvent::Position(x, y) => {
                let mut state = shared.state.write();
                state.requested.pos = (x, y);
                state.last.pos = (x, y);
                Event::Moved { x, y, t }
            }
            RawEvent::Size(width, height) => {
                let mut state = shared.state.write();
                state.requested.size = (width, height);
                state.last.size = (width, height);
                Event::Resized { width, height, t }
            }
            RawEvent::FramebufferSize(width, height) => {
                {
                    let mut state = shared.state.write();
                    state.requested.framebuffer_size = (width, height);
                    state.last.framebuffer_size = (width, height);
                }
                shared.renderer.update_bounds(Bounds::from_size(width, height));
                Event::FramebufferResized { width, height, t }
            }
            RawEvent::FileDrop(items) => Event::ItemsDropped { items, t },
            RawEvent::CursorPosition(x, y) => {
                let mut state = shared.state.write();
                if state.requested.cursor_grabbed {
                    let previous = state.cursor_baseline.replace((x, y));
                    // First sample after a (re)grab only sets the baseline.
                    let (px, py) = previous?;
                    Event::CursorMoved { x: x - px, y: y - py, delta: true, t }
                } else {
                    state.requested.cursor_pos = (x, y);
                    state.last.cursor_pos = (x, y);
                    Event::CursorMoved { x, y, delta: false, t }
                }
            }
            RawEvent::CursorEnter(true) => Event::CursorEnter { t },
            RawEvent::CursorEnter(false) => Event::CursorExit { t },
            RawEvent::Char(ch) => Event::KeyTyped { ch, t },
            RawEvent::Key { key, scancode, action } => {
                let state = button_state(action)?;
                let raw = u64::from(scancode.unsigned_abs());
                shared.keyboard.set_state(key, raw, state);
                Event::KeyState { key, state, raw, t }
            }
            RawEvent::MouseButton { button, action } => {
                let state = button_state(action)?;
                shared.mouse.set_state(button, state);
                Event::MouseButton { button, state, t }
            }
            RawEvent::Scroll(x, y) => Event::MouseScrolled { x, y, t },
        };

        Some(event)
    }
}

/// Press/release as a button state; auto-repeat is not a transition
fn button_state(action: Action) -> Option<ButtonState> {
    match action {
        Action::Press => Some(ButtonState::Down),
        Action::Release => Some(ButtonState::Up),
        Action::Repeat => None,
    }
}
