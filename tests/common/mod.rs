//! Common test utilities for driving the SSE endpoint

use logstream::server::{self, LogsState, LOG_STREAM_PATH};
use logstream::LogSource;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub const WAIT: Duration = Duration::from_secs(5);

/// A server bound to an ephemeral port, shut down on drop
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(source: Arc<dyn LogSource>, default_tail: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let state = LogsState::new(source, default_tail, shutdown.clone());

        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            server::serve(listener, server::router(state), async move {
                signal.cancelled().await
            })
            .await
            .unwrap();
        });

        Self {
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("http://{}{}", self.addr, LOG_STREAM_PATH)
        } else {
            format!("http://{}{}?{}", self.addr, LOG_STREAM_PATH, query)
        }
    }

    pub async fn connect(&self, query: &str) -> SseReader {
        let response = timeout(WAIT, reqwest::get(self.url(query)))
            .await
            .expect("timed out connecting")
            .unwrap();
        assert!(response.status().is_success());
        SseReader::new(response)
    }

    /// Cancel every open stream and wait for the server to exit
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            timeout(WAIT, handle)
                .await
                .expect("server did not shut down")
                .unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// An SSE event as seen on the wire; comments and keep-alives are skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

pub struct SseReader {
    response: reqwest::Response,
    buffer: String,
}

impl SseReader {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: String::new(),
        }
    }

    pub fn content_type(&self) -> Option<String> {
        self.response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Next event, or `None` once the server ends the body
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            while let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_block(&block) {
                    return Some(event);
                }
            }

            let chunk = timeout(WAIT, self.response.chunk())
                .await
                .expect("timed out waiting for an event")
                .unwrap()?;
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    /// Data of the next `count` events
    pub async fn take_data(&mut self, count: usize) -> Vec<String> {
        let mut data = Vec::with_capacity(count);
        for _ in 0..count {
            match self.next_event().await {
                Some(event) => data.push(event.data),
                None => break,
            }
        }
        data
    }

    /// Data of every remaining event
    pub async fn drain_data(&mut self) -> Vec<String> {
        let mut data = Vec::new();
        while let Some(event) = self.next_event().await {
            data.push(event.data);
        }
        data
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Option<String> = None;
    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        }
    }
    data.map(|data| SseEvent { event, data })
}
