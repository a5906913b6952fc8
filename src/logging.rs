//! Tracing subscriber setup for the binary and integration tests.

use std::io;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "teamcalc=info";

static INIT: Once = Once::new();

/// Install the fmt subscriber. `RUST_LOG` overrides [DEFAULT_FILTER]. Output
/// goes to stderr so JSON on stdout stays machine-readable. Safe to call more
/// than once.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(io::stderr)
            .try_init();
    });
}
