use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize a tracing subscriber for tests.
///
/// Uses the `RUST_LOG` environment variable for the filter, defaulting to
/// "info". Safe to call from every test; only the first call installs the
/// subscriber.
pub fn init() {
    let fmt_layer = fmt::layer().with_target(true).with_level(true).compact();

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();
}
