//! Logging utilities and structured logging support

use std::sync::Once;

pub use log::{debug, info, warn, error, trace};

static INIT: Once = Once::new();

/// Initialize the logging system from `RUST_LOG`, defaulting to `info`
pub fn init() {
    init_with_filter("info");
}

/// Initialize the logging system with a default filter
///
/// `default_filter` uses the `env_logger` filter syntax (e.g. `"info"` or
/// `"chilli_engine::render=debug"`). A `RUST_LOG` environment variable takes
/// precedence. Repeated calls are ignored, so tests and binaries can both call it.
pub fn init_with_filter(default_filter: &str) {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or(default_filter.to_string());
        let result = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init();

        if result.is_ok() {
            log::debug!("Logging initialized (default filter '{}')", default_filter);
        }
    });
}
