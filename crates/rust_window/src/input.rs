//! Keyboard and mouse state tracking
//!
//! The watchers are passive tables. The event translator writes into them on
//! the main thread before the matching event is published, so a subscriber
//! that queries a watcher after receiving an event sees the new state.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

/// Up/down state of a key or button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ButtonState {
    /// Not held
    #[default]
    Up,
    /// Held
    Down,
}

/// Key codes
///
/// Covers every key the native layer names. Keys it cannot identify all
/// report as [`Key::Unknown`], so tell them apart by scancode with
/// [`KeyboardWatcher::raw_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Key {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12, F13,
    F14, F15, F16, F17, F18, F19, F20, F21, F22, F23, F24, F25,
    Kp0, Kp1, Kp2, Kp3, Kp4, Kp5, Kp6, Kp7, Kp8, Kp9,
    KpDecimal, KpDivide, KpMultiply, KpSubtract, KpAdd, KpEnter, KpEqual,
    Apostrophe, Comma, Minus, Period, Slash, Semicolon, Equal,
    LeftBracket, Backslash, RightBracket, GraveAccent, World1, World2,
    /// Space key
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Tab key
    Tab,
    /// Backspace key
    Backspace,
    Insert,
    /// Delete key
    Delete,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    PageUp, PageDown, Home, End,
    CapsLock, ScrollLock, NumLock, PrintScreen, Pause,
    LeftShift, RightShift, LeftControl, RightControl, LeftAlt, RightAlt,
    LeftSuper, RightSuper, Menu,
    /// A key with no mapping; see the raw scancode
    Unknown,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
    /// Any further button, numbered from 4
    Other(u8),
}

/// Thread-safe state table for one kind of button
#[derive(Debug)]
pub struct Watcher<K> {
    states: RwLock<HashMap<K, ButtonState>>,
}

impl<K: Copy + Eq + Hash> Default for Watcher<K> {
    fn default() -> Self {
        Self { states: RwLock::new(HashMap::new()) }
    }
}

impl<K: Copy + Eq + Hash> Watcher<K> {
    /// Create an empty watcher; everything reads as up
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state of `key`
    pub fn set_state(&self, key: K, state: ButtonState) {
        self.states.write().insert(key, state);
    }

    /// Current state of `key`
    pub fn state(&self, key: K) -> ButtonState {
        self.states.read().get(&key).copied().unwrap_or_default()
    }

    /// Whether `key` is held
    pub fn is_down(&self, key: K) -> bool {
        self.state(key) == ButtonState::Down
    }

    /// Every key currently held
    pub fn down(&self) -> Vec<K> {
        self.states
            .read()
            .iter()
            .filter(|(_, state)| **state == ButtonState::Down)
            .map(|(key, _)| *key)
            .collect()
    }
}

/// Keyboard state, by key code and by raw scancode
#[derive(Debug, Default)]
pub struct KeyboardWatcher {
    keys: Watcher<Key>,
    raw: Watcher<u64>,
}

impl KeyboardWatcher {
    /// Create a watcher with every key up
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key transition
    pub fn set_state(&self, key: Key, raw: u64, state: ButtonState) {
        self.keys.set_state(key, state);
        self.raw.set_state(raw, state);
    }

    /// Whether `key` is held
    pub fn is_down(&self, key: Key) -> bool {
        self.keys.is_down(key)
    }

    /// State of `key`
    pub fn state(&self, key: Key) -> ButtonState {
        self.keys.state(key)
    }

    /// State of a raw scancode
    pub fn raw_state(&self, raw: u64) -> ButtonState {
        self.raw.state(raw)
    }
}

/// Mouse button state
pub type MouseWatcher = Watcher<MouseButton>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_keys_read_up() {
        let keyboard = KeyboardWatcher::new();
        assert_eq!(keyboard.state(Key::W), ButtonState::Up);
        assert_eq!(keyboard.raw_state(17), ButtonState::Up);
    }

    #[test]
    fn test_key_and_raw_tracked_together() {
        let keyboard = KeyboardWatcher::new();
        keyboard.set_state(Key::W, 17, ButtonState::Down);
        assert!(keyboard.is_down(Key::W));
        assert_eq!(keyboard.raw_state(17), ButtonState::Down);

        keyboard.set_state(Key::W, 17, ButtonState::Up);
        assert!(!keyboard.is_down(Key::W));
    }

    #[test]
    fn test_unmapped_keys_distinguished_by_scancode() {
        let keyboard = KeyboardWatcher::new();
        keyboard.set_state(Key::Unknown, 200, ButtonState::Down);
        keyboard.set_state(Key::Unknown, 201, ButtonState::Down);
        keyboard.set_state(Key::Unknown, 200, ButtonState::Up);

        assert_eq!(keyboard.raw_state(200), ButtonState::Up);
        assert_eq!(keyboard.raw_state(201), ButtonState::Down);
    }

    #[test]
    fn test_mouse_down_list() {
        let mouse = MouseWatcher::new();
        mouse.set_state(MouseButton::Left, ButtonState::Down);
        mouse.set_state(MouseButton::Right, ButtonState::Down);
        mouse.set_state(MouseButton::Right, ButtonState::Up);
        assert_eq!(mouse.down(), vec![MouseButton::Left]);
    }
}
