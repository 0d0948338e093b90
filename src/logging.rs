use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LOG_ENV;

const DEFAULT_FILTER: &str = "warn";

/// Installs the stderr subscriber. Later calls are no-ops.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
