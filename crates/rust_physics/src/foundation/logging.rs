//! Logging utilities and structured logging support
//!
//! The engine logs through the `log` facade. Hosts decide the backend; the
//! helpers here wire up `env_logger` for binaries and tests.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// Honors `RUST_LOG` and defaults to `info` when it is unset. Calling this
/// more than once is harmless.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Initialize logging for unit tests, routed through the test harness capture
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
