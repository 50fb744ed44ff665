use grhost_core::HostError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "GRHOST_LOG";

const DEFAULT_FILTER: &str = "info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. `json` switches to one JSON object per line.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(json: bool) -> Result<(), HostError> {
    let registry = tracing_subscriber::registry().with(filter());

    let result = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(false),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    };

    result.map_err(|e| HostError::configuration_error(format!("logging already initialized: {e}")))
}
