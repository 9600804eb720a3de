//! # Rust Window
//!
//! Thread-safe window coordination over a thread-affine native windowing
//! library.
//!
//! ## Features
//!
//! - **Main-Thread Dispatch**: Any thread can reach the native window; only the run loop calls it
//! - **Property Reconciliation**: Window changes become the minimal set of native calls
//! - **Event Fan-Out**: Typed events delivered to any number of subscriber queues
//! - **Shared-Context Loading**: A loader thread with its own context sharing the window's objects
//! - **Headless Platform**: The whole stack runs without a display for tests and CI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_window::prelude::*;
//! use crossbeam_channel::bounded;
//!
//! fn main() -> Result<(), RunError> {
//!     rust_window::foundation::logging::init();
//!
//!     let props = Props::default().with_title("Demo - {FPS}");
//!     run(HeadlessPlatform::new(), QueueBackend::default(), Some(props), |window, renderer| {
//!         let (events, rx) = bounded(256);
//!         window.notify(&events, EventMask::KEYBOARD | EventMask::CLOSE);
//!
//!         for event in rx.iter() {
//!             match event {
//!                 Event::KeyState { key: Key::Escape, .. } | Event::Close { .. } => break,
//!                 _ => {
//!                     let _ = renderer.render(|| {});
//!                 }
//!             }
//!         }
//!         window.close();
//!     })
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::must_use_candidate)]

pub mod config;
pub mod device;
pub mod dispatch;
pub mod event;
pub mod foundation;
pub mod input;
pub mod loader;
pub mod native;
pub mod notify;
pub mod props;
pub mod reconcile;
pub mod run_loop;
pub mod window;

mod translate;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{Config, ConfigError, LoopConfig};
pub use device::{Backend, Bounds, Device, DeviceError, QueueBackend, QueueRenderer, Renderer};
pub use dispatch::DispatchError;
pub use event::{Event, EventMask};
pub use input::{ButtonState, Key, KeyboardWatcher, MouseButton, MouseWatcher};
pub use loader::LoaderError;
pub use native::{NativeError, Platform};
pub use props::{Precision, Props};
pub use run_loop::{run, run_with_config, RunError};
pub use window::Window;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        run, run_with_config, Backend, ButtonState, Config, Device, Event, EventMask, Key,
        LoopConfig, MouseButton, Props, QueueBackend, Renderer, RunError, Window,
    };
    pub use crate::native::headless::HeadlessPlatform;

    #[cfg(feature = "glfw")]
    pub use crate::native::glfw::GlfwPlatform;
}
