//! Formatting of the traces and events the library emits, for binaries.

use std::io;

use tracing_subscriber::fmt;

pub use tracing_core::Level;

/// possible log levels
pub const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Installs a global subscriber writing to stderr. Nothing is logged
/// without a level.
pub fn init(level: Option<Level>) {
    let Some(level) = level else {
        return;
    };
    let format = fmt::format().without_time().with_target(false).compact();
    let installed = fmt()
        .with_max_level(level)
        .event_format(format)
        .with_writer(io::stderr)
        .try_init();
    if installed.is_err() {
        tracing::debug!("a global subscriber was already installed");
    }
}
