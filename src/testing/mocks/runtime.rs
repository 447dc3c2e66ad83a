//! Mock container runtime for testing log tailing

use crate::logs::runtime::{ContainerInfo, ContainerRuntime, LogFrame, RuntimeError};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// What a mock log stream does after its scripted frames
#[derive(Debug, Clone)]
pub enum StreamEnding {
    /// Stay open forever, like a followed container that has gone quiet
    Follow,
    /// End of stream
    Eof,
    /// Fail with a read error
    Error(String),
}

#[derive(Debug, Clone)]
struct LogScript {
    frames: Vec<LogFrame>,
    ending: StreamEnding,
}

/// Builder for creating configured mock runtimes
pub struct MockContainerRuntimeBuilder {
    containers: Vec<ContainerInfo>,
    scripts: HashMap<String, LogScript>,
    list_error: Option<String>,
}

impl Default for MockContainerRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContainerRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            containers: Vec::new(),
            scripts: HashMap::new(),
            list_error: None,
        }
    }

    /// Add a running container; listing order is insertion order. Its log
    /// stream follows forever unless scripted otherwise.
    pub fn with_container(mut self, id: &str, names: &[&str]) -> Self {
        self.containers.push(ContainerInfo::new(
            id,
            names.iter().map(|n| n.to_string()).collect(),
        ));
        self.script(id);
        self
    }

    /// Frames the container's log stream yields before its ending
    pub fn with_frames(mut self, id: &str, frames: Vec<LogFrame>) -> Self {
        self.script(id).frames.extend(frames);
        self
    }

    pub fn with_ending(mut self, id: &str, ending: StreamEnding) -> Self {
        self.script(id).ending = ending;
        self
    }

    pub fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    pub fn build(self) -> MockContainerRuntime {
        MockContainerRuntime {
            containers: self.containers,
            scripts: self.scripts,
            list_error: self.list_error,
            open_streams: Arc::new(AtomicUsize::new(0)),
            follow_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn script(&mut self, id: &str) -> &mut LogScript {
        self.scripts
            .entry(id.to_string())
            .or_insert_with(|| LogScript {
                frames: Vec::new(),
                ending: StreamEnding::Follow,
            })
    }
}

/// Mock implementation of ContainerRuntime for testing
pub struct MockContainerRuntime {
    containers: Vec<ContainerInfo>,
    scripts: HashMap<String, LogScript>,
    list_error: Option<String>,
    open_streams: Arc<AtomicUsize>,
    follow_requests: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockContainerRuntime {
    pub fn builder() -> MockContainerRuntimeBuilder {
        MockContainerRuntimeBuilder::new()
    }

    /// Log streams handed out and not yet dropped
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Every `(container_id, tail)` passed to `follow_logs`
    pub fn follow_requests(&self) -> Vec<(String, usize)> {
        self.follow_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for MockContainerRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        match &self.list_error {
            Some(message) => Err(RuntimeError::List(message.clone())),
            None => Ok(self.containers.clone()),
        }
    }

    fn follow_logs(
        &self,
        container_id: &str,
        tail: usize,
    ) -> BoxStream<'static, Result<LogFrame, RuntimeError>> {
        self.follow_requests
            .lock()
            .unwrap()
            .push((container_id.to_string(), tail));

        let script = self.scripts.get(container_id).cloned().unwrap_or(LogScript {
            frames: Vec::new(),
            ending: StreamEnding::Error(format!("No such container: {}", container_id)),
        });

        let ending: BoxStream<'static, Result<LogFrame, RuntimeError>> = match script.ending {
            StreamEnding::Follow => stream::pending().boxed(),
            StreamEnding::Eof => stream::empty().boxed(),
            StreamEnding::Error(message) => {
                stream::once(async move { Err(RuntimeError::Logs(message)) }).boxed()
            }
        };
        let inner = stream::iter(script.frames.into_iter().map(Ok))
            .chain(ending)
            .boxed();

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        TrackedStream {
            inner,
            open_streams: Arc::clone(&self.open_streams),
        }
        .boxed()
    }
}

/// Counts itself out of `open_streams` when dropped
struct TrackedStream {
    inner: BoxStream<'static, Result<LogFrame, RuntimeError>>,
    open_streams: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
    type Item = Result<LogFrame, RuntimeError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}
