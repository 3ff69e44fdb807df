//! Logging setup for the provider binary.
//!
//! Logs go to **stderr**; stdout carries the handshake line and nothing else.
//!
//! The filter is read from `DEVLAKE_PROVIDER_LOG`, then `RUST_LOG`, and
//! defaults to `info`:
//!
//! ```bash
//! DEVLAKE_PROVIDER_LOG=devlake_provider=debug ./devlake-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the provider's log filter.
pub const LOG_ENV: &str = "DEVLAKE_PROVIDER_LOG";

const DEFAULT_LEVEL: &str = "info";

/// Build the filter from `DEVLAKE_PROVIDER_LOG`, falling back to `RUST_LOG`
/// and then `default_level`.
fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn try_init_with(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}

/// Install the stderr subscriber with an `info` default.
///
/// Returns `false` when a global subscriber was already set.
pub fn try_init_logging() -> bool {
    try_init_with(DEFAULT_LEVEL)
}

/// Like [`try_init_logging`] with a different default level.
pub fn try_init_logging_with_default(default_level: &str) -> bool {
    try_init_with(default_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_parse() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("devlake_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,devlake_provider::client=trace").is_ok());
    }

    #[test]
    fn test_second_init_is_rejected() {
        // Whichever call wins the race installs the subscriber; the other must not panic.
        let first = try_init_logging();
        let second = try_init_logging();
        assert!(!(first && second));
    }
}
