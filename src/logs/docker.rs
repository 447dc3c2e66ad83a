//! Container log tailer
//!
//! Resolves a logical service name to a running container and follows its
//! combined output. Everything that goes wrong after the container has been
//! found is reported as a final line in the stream.

use super::frame::{strip_stream_header, LineSplitter, StreamKind};
use super::runtime::{ContainerInfo, ContainerRuntime, DockerRuntime, LogFrame, RuntimeError};
use super::source::LogSource;
use super::types::{LogStream, DEFAULT_CONDUIT_CAPACITY, DEFAULT_MAX_LINE_BYTES};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Streams logs from containers managed by a [`ContainerRuntime`]
pub struct DockerLogService {
    runtime: Arc<dyn ContainerRuntime>,
    conduit_capacity: usize,
    max_line_bytes: usize,
}

impl DockerLogService {
    /// Connect to the local Docker daemon and make sure it answers
    pub async fn connect(socket: Option<&str>) -> Result<Self> {
        let runtime = DockerRuntime::connect(socket)?;
        runtime.ping().await?;
        info!("Connected to Docker daemon");
        Ok(Self::with_runtime(Arc::new(runtime)))
    }

    pub fn with_runtime(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            conduit_capacity: DEFAULT_CONDUIT_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn conduit_capacity(mut self, capacity: usize) -> Self {
        self.conduit_capacity = capacity.max(1);
        self
    }

    pub fn max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit.max(1);
        self
    }
}

/// First container, in listing order, with a name containing `service`.
///
/// The leading `/` Docker puts on names is ignored. When several containers
/// match, the winner depends on the order the runtime lists them in.
pub fn find_container<'a>(containers: &'a [ContainerInfo], service: &str) -> Option<&'a str> {
    containers
        .iter()
        .find(|container| {
            container
                .names
                .iter()
                .any(|name| name.trim_start_matches('/').contains(service))
        })
        .map(|container| container.id.as_str())
}

#[async_trait]
impl LogSource for DockerLogService {
    async fn stream_logs(
        &self,
        cancel: &CancellationToken,
        service: &str,
        tail: usize,
    ) -> Result<LogStream> {
        let containers = self.runtime.list_running().await?;

        let Some(container_id) = find_container(&containers, service).map(str::to_owned) else {
            debug!(service, "No container matched service");
            return Ok(LogStream::closed_with(vec![format!(
                "No container found for service: {}",
                service
            )]));
        };

        let session = cancel.child_token();
        let (tx, rx) = mpsc::channel(self.conduit_capacity);
        let frames = self.runtime.follow_logs(&container_id, tail);

        debug!(service, container = %container_id, tail, "Following container logs");
        tokio::spawn(follow(
            frames,
            tx,
            session.clone(),
            self.max_line_bytes,
            container_id,
        ));

        Ok(LogStream::new(rx, session.drop_guard()))
    }
}

/// Read loop for one session. Owns the runtime stream and the sending half of
/// the conduit; both are released when this returns.
async fn follow(
    mut frames: BoxStream<'static, std::result::Result<LogFrame, RuntimeError>>,
    tx: mpsc::Sender<String>,
    session: CancellationToken,
    max_line_bytes: usize,
    container_id: String,
) {
    // One splitter per stream kind, in the order each kind first produced output.
    let mut splitters: Vec<(StreamKind, LineSplitter)> = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = session.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(frame)) => {
                let splitter = splitter_for(&mut splitters, frame.kind, max_line_bytes);
                match splitter.push(&frame.payload) {
                    Ok(lines) => {
                        for line in lines {
                            if !forward(&tx, &session, decode_line(frame.kind, &line)).await {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        forward(&tx, &session, format!("Scanner error: {}", e)).await;
                        break;
                    }
                }
                if session.is_cancelled() || tx.is_closed() {
                    break;
                }
            }
            Some(Err(e)) => {
                forward(&tx, &session, format!("Error reading logs: {}", e)).await;
                break;
            }
            None => {
                for (kind, splitter) in &mut splitters {
                    if let Some(line) = splitter.finish() {
                        if !forward(&tx, &session, decode_line(*kind, &line)).await {
                            break;
                        }
                    }
                }
                break;
            }
        }
    }

    drop(frames);
    debug!(container = %container_id, "Container log stream closed");
}

fn splitter_for(
    splitters: &mut Vec<(StreamKind, LineSplitter)>,
    kind: StreamKind,
    max_line_bytes: usize,
) -> &mut LineSplitter {
    let index = match splitters.iter().position(|(k, _)| *k == kind) {
        Some(index) => index,
        None => {
            splitters.push((kind, LineSplitter::new(max_line_bytes)));
            splitters.len() - 1
        }
    };
    &mut splitters[index].1
}

/// Raw console output may still carry multiplexing headers; demultiplexed
/// stdout/stderr frames never do.
fn decode_line(kind: StreamKind, line: &[u8]) -> String {
    let line = match kind {
        StreamKind::Console => strip_stream_header(line),
        _ => line,
    };
    String::from_utf8_lossy(line).into_owned()
}

/// Send one line, giving up if the session is cancelled or the reader is gone
async fn forward(tx: &mpsc::Sender<String>, session: &CancellationToken, line: String) -> bool {
    tokio::select! {
        biased;
        _ = session.cancelled() => false,
        sent = tx.send(line) => sent.is_ok(),
    }
}
