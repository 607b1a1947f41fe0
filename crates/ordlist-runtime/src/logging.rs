#![forbid(unsafe_code)]

//! Diagnostic logging setup.
//!
//! The engine emits `tracing` events and spans unconditionally; hosts that
//! already install a subscriber see them there. For hosts that do not, the
//! `subscriber` feature provides [`init_subscriber`], a plain fmt subscriber
//! filtered by `ORDLIST_LOG` (same syntax as `RUST_LOG`, default `warn`).
//!
//! | Target | Level | What |
//! |--------|-------|------|
//! | `ordlist_runtime::engine` | `debug` | one `commit` span per commit |
//! | `ordlist_runtime::engine` | `warn` | refused reorders |
//! | `ordlist_core::grouping` | `warn` | group reorders refused while misaligned |
//! | `ordlist_runtime::config` | `warn` | unparseable `ORDLIST_*` values |
//! | `ordlist_view::virtualized` | `trace` | slot pool churn |

use std::fmt;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "ORDLIST_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Errors that can occur while installing the subscriber.
#[derive(Debug)]
pub enum LoggingError {
    /// A global tracing subscriber is already installed.
    SubscriberAlreadySet,
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberAlreadySet => {
                write!(f, "a global tracing subscriber is already set")
            }
        }
    }
}

impl std::error::Error for LoggingError {}

/// Install a global fmt subscriber filtered by `ORDLIST_LOG`.
///
/// # Errors
///
/// Fails if another global subscriber was installed first.
#[cfg(feature = "subscriber")]
pub fn init_subscriber() -> Result<(), LoggingError> {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|_| LoggingError::SubscriberAlreadySet)
}
