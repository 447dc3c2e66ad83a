//! Line sinks and the tracing writer that feeds them

use super::app::AppLogService;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Anything that accepts complete lines of text
pub trait LogSink: Send + Sync {
    fn ingest_line(&self, line: String);
}

impl LogSink for AppLogService {
    fn ingest_line(&self, line: String) {
        self.ingest(line);
    }
}

/// `MakeWriter` that forwards formatted tracing output to a [`LogSink`].
#[derive(Clone)]
pub struct LineSinkWriter {
    sink: Arc<dyn LogSink>,
}

impl LineSinkWriter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl<'a> MakeWriter<'a> for LineSinkWriter {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter::new(Arc::clone(&self.sink))
    }
}

/// Splits written bytes on `\n` and hands each complete line to the sink.
///
/// A trailing fragment without a newline is emitted when the writer is dropped.
pub struct LineWriter {
    sink: Arc<dyn LogSink>,
    pending: Vec<u8>,
}

impl LineWriter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            pending: Vec::new(),
        }
    }

    fn emit(&self, bytes: &[u8]) {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        self.sink
            .ingest_line(String::from_utf8_lossy(bytes).into_owned());
    }
}

impl io::Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            if self.pending.is_empty() {
                self.emit(&rest[..pos]);
            } else {
                self.pending.extend_from_slice(&rest[..pos]);
                let line = std::mem::take(&mut self.pending);
                self.emit(&line);
            }
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line);
        }
    }
}
