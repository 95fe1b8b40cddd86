//! Logging setup
//!
//! Diagnostics go to stderr so stdout only carries the progress lines and
//! retrieved values of the demonstration run.

use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Build the filter from RUST_LOG, or from `log_level` when it is unset
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Initialize the global tracing subscriber
pub fn init_tracing(log_level: &str, format: LogFormat) {
    let json_layer = (format == LogFormat::Json).then(|| fmt::layer().json().with_writer(io::stderr));
    let text_layer = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(json_layer)
        .with(text_layer)
        .init();
}
