//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// Reads `RUST_LOG` like `env_logger::init`, but later calls are ignored so
/// tests and embedding applications may call it freely.
pub fn init() {
    let _ = env_logger::try_init();
}

/// Initialize the logging system with an explicit filter (e.g. `"rust_window=debug"`)
pub fn init_with_filter(filter: &str) {
    let _ = env_logger::Builder::new()
        .parse_filters(filter)
        .is_test(cfg!(test))
        .try_init();
}
