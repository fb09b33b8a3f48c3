//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process. Safe to call multiple times
/// (subsequent calls are no-ops).
///
/// Defaults to human-readable `fmt` output; set `CMS_LOG_JSON=1` for
/// structured JSON logs, and `RUST_LOG` to control filtering (defaults to
/// `info`).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("CMS_LOG_JSON").map(|v| v == "1").unwrap_or(false);

    if json {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).json().try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
    }
}
