//! Core types for log streaming

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

/// Reserved logical service name for the hosting process's own output
pub const APPLICATION_SERVICE: &str = "application";

/// Default number of lines kept in the in-process history
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Default per-subscriber queue depth for live lines
pub const DEFAULT_CONDUIT_CAPACITY: usize = 100;

/// Default upper bound on a single container log line
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// A live, cancellable sequence of log lines.
///
/// The stream ends when its producer closes the conduit: on cancellation, at the
/// end of the underlying source, or after a diagnostic line. Dropping the stream
/// cancels the session that feeds it, so the producer side releases its
/// resources even if the caller never cancels its own token.
#[derive(Debug)]
pub struct LogStream {
    rx: mpsc::Receiver<String>,
    _session: Option<DropGuard>,
}

impl LogStream {
    pub(crate) fn new(rx: mpsc::Receiver<String>, session: DropGuard) -> Self {
        Self {
            rx,
            _session: Some(session),
        }
    }

    /// A stream that is already closed and yields nothing
    pub fn empty() -> Self {
        Self::closed_with(Vec::new())
    }

    /// A stream that yields exactly `lines` and then ends
    pub fn closed_with(lines: Vec<String>) -> Self {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            // Capacity covers every line, so this cannot fail.
            let _ = tx.try_send(line);
        }
        Self { rx, _session: None }
    }

    /// Receive the next line, or `None` once the stream has closed
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Drain every line until the stream closes
    pub async fn collect_lines(mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.rx.recv().await {
            lines.push(line);
        }
        lines
    }
}

impl Stream for LogStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.rx.poll_recv(cx)
    }
}
