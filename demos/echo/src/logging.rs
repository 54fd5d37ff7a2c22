//! Logging setup.

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber. `RUST_LOG` wins over `log_level` when set.
pub fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .with_thread_names(true),
        )
        .init();

    info!(level = log_level, "logging initialized");
}
