//! Tracing setup: stderr output plus the in-process log broadcaster

use crate::error::{ErrorCode, LogStreamError, Result};
use crate::logs::{LineSinkWriter, LogSink};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive for the configured level raised by `-v` flags
pub fn filter_directive(log_level: &str, verbose: u8) -> String {
    match verbose {
        0 => log_level.to_lowercase(),
        1 => "debug".to_string(),
        2 => "trace".to_string(),
        _ => "trace,hyper=debug,tower=debug".to_string(),
    }
}

/// Install the global subscriber. Every formatted event goes to stderr and, as
/// one line per event, into `sink`.
pub fn init(log_level: &str, verbose: u8, ansi: bool, sink: Arc<dyn LogSink>) -> Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level, verbose)).map_err(|e| {
        LogStreamError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, "Invalid log filter")
            .with_source(e)
    })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose >= 2)
                .with_thread_ids(verbose >= 3)
                .with_line_number(verbose >= 3),
        )
        .with(
            fmt::layer()
                .with_writer(LineSinkWriter::new(sink))
                .with_ansi(ansi)
                .with_target(false),
        )
        .try_init()
        .map_err(|e| {
            LogStreamError::server_with_code(
                ErrorCode::SERVER_LOGGING_INIT,
                "Failed to install tracing subscriber",
            )
            .with_source(e)
        })
}
