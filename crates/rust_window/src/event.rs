//! Window events and event masks

use crate::input::{ButtonState, Key, MouseButton};
use bitflags::bitflags;
use std::time::Instant;

bitflags! {
    /// Set of event types a subscriber wants
    ///
    /// Masks combine with `|`. The empty mask ([`EventMask::NO_EVENTS`])
    /// unsubscribes a queue.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        /// [`Event::Close`]
        const CLOSE = 1 << 0;
        /// [`Event::Damaged`]
        const DAMAGED = 1 << 1;
        /// [`Event::CursorMoved`]
        const CURSOR_MOVED = 1 << 2;
        /// [`Event::CursorEnter`]
        const CURSOR_ENTER = 1 << 3;
        /// [`Event::CursorExit`]
        const CURSOR_EXIT = 1 << 4;
        /// [`Event::Minimized`]
        const MINIMIZED = 1 << 5;
        /// [`Event::Restored`]
        const RESTORED = 1 << 6;
        /// [`Event::GainedFocus`]
        const GAINED_FOCUS = 1 << 7;
        /// [`Event::LostFocus`]
        const LOST_FOCUS = 1 << 8;
        /// [`Event::Moved`]
        const MOVED = 1 << 9;
        /// [`Event::Resized`]
        const RESIZED = 1 << 10;
        /// [`Event::FramebufferResized`]
        const FRAMEBUFFER_RESIZED = 1 << 11;
        /// [`Event::ItemsDropped`]
        const ITEMS_DROPPED = 1 << 12;
        /// [`Event::MouseButton`]
        const MOUSE_BUTTON = 1 << 13;
        /// [`Event::MouseScrolled`]
        const MOUSE_SCROLLED = 1 << 14;
        /// [`Event::KeyTyped`]
        const KEY_TYPED = 1 << 15;
        /// [`Event::KeyState`]
        const KEY_STATE = 1 << 16;
    }
}

impl EventMask {
    /// Matches nothing; subscribing with it removes the queue
    pub const NO_EVENTS: Self = Self::empty();

    /// Every window-level (non-input) event
    pub const WINDOW: Self = Self::CLOSE
        .union(Self::DAMAGED)
        .union(Self::MINIMIZED)
        .union(Self::RESTORED)
        .union(Self::GAINED_FOCUS)
        .union(Self::LOST_FOCUS)
        .union(Self::MOVED)
        .union(Self::RESIZED)
        .union(Self::FRAMEBUFFER_RESIZED)
        .union(Self::ITEMS_DROPPED);

    /// Every mouse event
    pub const MOUSE: Self = Self::CURSOR_MOVED
        .union(Self::CURSOR_ENTER)
        .union(Self::CURSOR_EXIT)
        .union(Self::MOUSE_BUTTON)
        .union(Self::MOUSE_SCROLLED);

    /// Every keyboard event
    pub const KEYBOARD: Self = Self::KEY_TYPED.union(Self::KEY_STATE);
}

/// An event that happened to the window
///
/// Every variant carries the time `t` at which it was translated.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The user asked to close the window and `Props::should_close` is false
    Close {
        /// Timestamp
        t: Instant,
    },
    /// The window contents need to be redrawn
    Damaged {
        /// Timestamp
        t: Instant,
    },
    /// The cursor moved
    ///
    /// With the cursor grabbed, `x`/`y` are a delta from the previous sample
    /// and `delta` is true; otherwise they are a window-relative position.
    CursorMoved {
        /// Horizontal position or delta
        x: f64,
        /// Vertical position or delta
        y: f64,
        /// Whether `x`/`y` are relative
        delta: bool,
        /// Timestamp
        t: Instant,
    },
    /// The cursor entered the window
    CursorEnter {
        /// Timestamp
        t: Instant,
    },
    /// The cursor left the window
    CursorExit {
        /// Timestamp
        t: Instant,
    },
    /// The window was minimized
    Minimized {
        /// Timestamp
        t: Instant,
    },
    /// The window was restored from minimized
    Restored {
        /// Timestamp
        t: Instant,
    },
    /// The window gained input focus
    GainedFocus {
        /// Timestamp
        t: Instant,
    },
    /// The window lost input focus
    LostFocus {
        /// Timestamp
        t: Instant,
    },
    /// The window moved
    Moved {
        /// New x position
        x: i32,
        /// New y position
        y: i32,
        /// Timestamp
        t: Instant,
    },
    /// The window was resized
    Resized {
        /// New width
        width: i32,
        /// New height
        height: i32,
        /// Timestamp
        t: Instant,
    },
    /// The framebuffer was resized
    FramebufferResized {
        /// New width in pixels
        width: i32,
        /// New height in pixels
        height: i32,
        /// Timestamp
        t: Instant,
    },
    /// Files were dropped onto the window
    ItemsDropped {
        /// Dropped paths
        items: Vec<String>,
        /// Timestamp
        t: Instant,
    },
    /// A mouse button changed state
    MouseButton {
        /// Button
        button: MouseButton,
        /// New state
        state: ButtonState,
        /// Timestamp
        t: Instant,
    },
    /// The mouse wheel or trackpad scrolled
    MouseScrolled {
        /// Horizontal offset
        x: f64,
        /// Vertical offset
        y: f64,
        /// Timestamp
        t: Instant,
    },
    /// A character was typed
    KeyTyped {
        /// The character
        ch: char,
        /// Timestamp
        t: Instant,
    },
    /// A key changed state
    KeyState {
        /// Key code
        key: Key,
        /// New state
        state: ButtonState,
        /// Platform scancode
        raw: u64,
        /// Timestamp
        t: Instant,
    },
}

impl Event {
    /// The mask flag of this event's type
    pub fn mask(&self) -> EventMask {
        match self {
            Self::Close { .. } => EventMask::CLOSE,
            Self::Damaged { .. } => EventMask::DAMAGED,
            Self::CursorMoved { .. } => EventMask::CURSOR_MOVED,
            Self::CursorEnter { .. } => EventMask::CURSOR_ENTER,
            Self::CursorExit { .. } => EventMask::CURSOR_EXIT,
            Self::Minimized { .. } => EventMask::MINIMIZED,
            Self::Restored { .. } => EventMask::RESTORED,
            Self::GainedFocus { .. } => EventMask::GAINED_FOCUS,
            Self::LostFocus { .. } => EventMask::LOST_FOCUS,
            Self::Moved { .. } => EventMask::MOVED,
            Self::Resized { .. } => EventMask::RESIZED,
            Self::FramebufferResized { .. } => EventMask::FRAMEBUFFER_RESIZED,
            Self::ItemsDropped { .. } => EventMask::ITEMS_DROPPED,
            Self::MouseButton { .. } => EventMask::MOUSE_BUTTON,
            Self::MouseScrolled { .. } => EventMask::MOUSE_SCROLLED,
            Self::KeyTyped { .. } => EventMask::KEY_TYPED,
            Self::KeyState { .. } => EventMask::KEY_STATE,
        }
    }

    /// When the event was translated
    pub fn time(&self) -> Instant {
        match self {
            Self::Close { t }
            | Self::Damaged { t }
            | Self::CursorMoved { t, .. }
            | Self::CursorEnter { t }
            | Self::CursorExit { t }
            | Self::Minimized { t }
            | Self::Restored { t }
            | Self::GainedFocus { t }
            | Self::LostFocus { t }
            | Self::Moved { t, .. }
            | Self::Resized { t, .. }
            | Self::FramebufferResized { t, .. }
            | Self::ItemsDropped { t, .. }
            | Self::MouseButton { t, .. }
            | Self::MouseScrolled { t, .. }
            | Self::KeyTyped { t, .. }
            | Self::KeyState { t, .. } => *t,
        }
    }
}
