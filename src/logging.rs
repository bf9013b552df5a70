//! Tracing subscriber setup for the binary

use tracing_subscriber::EnvFilter;

use crate::settings::LogSettings;

/// Install a global fmt subscriber. `RUST_LOG` overrides the configured level.
///
/// Logs go to stderr so stdout stays free for the run output. A subscriber
/// that is already installed is left in place.
pub fn init_logging(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if settings.json {
        builder.json().try_init().ok();
    } else {
        builder.try_init().ok();
    }
}
