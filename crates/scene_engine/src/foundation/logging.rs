//! Logging utilities

use env_logger::{Builder, Env};

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// `RUST_LOG` wins when set; otherwise `default_level` (for example `"info"`
/// or `"scene_engine=debug"`) is used. Returns `false` if a logger was
/// already installed.
pub fn init(default_level: &str) -> bool {
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

/// Install a test logger that writes through the test harness capture
pub fn init_for_tests() {
    let _ = Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
