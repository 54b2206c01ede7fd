//! Logging setup for `ixfrd`.
//!
//! This is a trimmed form of the host project's logger: an `EnvFilter`-driven
//! `tracing-subscriber` registry with a plain formatting layer for stdout,
//! stderr, or a file. The host project additionally supports a syslog
//! transport and runtime filter reloading for its long-lived daemon; neither
//! is needed by this focused CLI (it runs one command and exits), so both are
//! dropped — see `DESIGN.md`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::Layer as FmtLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogTarget, LoggingConfig};
use crate::error::ExitError;

/// Initialize the global `tracing` subscriber from `config`.
///
/// ## Panics
///
/// Panics if a global subscriber has already been set, per `tracing`'s own
/// contract.
pub fn init(config: &LoggingConfig) -> Result<(), ExitError> {
    let filter = EnvFilter::try_new(config.level.as_tracing_filter())
        .map_err(|e| ExitError::Logging(e.to_string()))?;

    match &config.target {
        LogTarget::Stdout => {
            let layer = FmtLayer::new()
                .with_ansi(supports_color::on(supports_color::Stream::Stdout).is_some())
                .with_writer(std::io::stdout);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogTarget::Stderr => {
            let layer = FmtLayer::new()
                .with_ansi(supports_color::on(supports_color::Stream::Stderr).is_some())
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogTarget::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ExitError::Logging(format!("{path}: {e}")))?;
            let layer = FmtLayer::new().with_ansi(false).with_writer(file);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }

    Ok(())
}
