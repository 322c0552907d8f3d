//! Tracing setup.
//!
//! JSON lines on stdout when not attached to a TTY (container and
//! pipeline runs), colorized human-readable output otherwise. The filter
//! honors `RUST_LOG` first and falls back to the configured level.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. Safe to call more than
/// once; only the first call wins.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if std::io::stdout().is_terminal() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init();
    }
}
