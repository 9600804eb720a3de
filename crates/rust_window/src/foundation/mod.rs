//! Foundation module - Core utilities shared by the window subsystems
//!
//! - Logging setup
//! - Frame timing used for the `{FPS}` title token

pub mod logging;
pub mod time;
