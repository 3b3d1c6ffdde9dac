//! Tracing setup for the `fedx` binary.
//!
//! Logs go to stderr so stdout stays reserved for command output. `RUST_LOG`
//! overrides the built-in filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "faculty_federation=info,federation_core=info";
const VERBOSE_FILTER: &str = "faculty_federation=debug,federation_core=debug";

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
