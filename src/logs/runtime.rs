//! Container runtime abstraction and its Docker implementation

use super::frame::StreamKind;
use crate::error::{ErrorCode, LogStreamError};
use async_trait::async_trait;
use bollard::container::{ListContainersOptions, LogOutput, LogsOptions};
use bollard::Docker;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;

/// How long a socket connection attempt may take, in seconds
const DOCKER_CONNECT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to list containers: {0}")]
    List(String),

    #[error("{0}")]
    Logs(String),
}

impl From<RuntimeError> for LogStreamError {
    fn from(err: RuntimeError) -> Self {
        let code = match &err {
            RuntimeError::Unavailable(_) => ErrorCode::RUNTIME_UNAVAILABLE,
            RuntimeError::List(_) => ErrorCode::RUNTIME_LIST_FAILED,
            RuntimeError::Logs(_) => ErrorCode::RUNTIME_LOGS_FAILED,
        };
        LogStreamError::runtime_with_code(code, err.to_string()).with_source(err)
    }
}

/// A running container as reported by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    /// Names as the runtime reports them; Docker prefixes each with `/`
    pub names: Vec<String>,
}

impl ContainerInfo {
    pub fn new(id: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            id: id.into(),
            names,
        }
    }
}

/// One chunk of container output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub kind: StreamKind,
    pub payload: Bytes,
}

impl LogFrame {
    pub fn new(kind: StreamKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

impl From<LogOutput> for LogFrame {
    fn from(output: LogOutput) -> Self {
        match output {
            LogOutput::StdIn { message } => Self::new(StreamKind::Stdin, message),
            LogOutput::StdOut { message } => Self::new(StreamKind::Stdout, message),
            LogOutput::StdErr { message } => Self::new(StreamKind::Stderr, message),
            LogOutput::Console { message } => Self::new(StreamKind::Console, message),
        }
    }
}

/// The two operations log tailing needs from a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Currently running containers, in the runtime's listing order
    async fn list_running(&self) -> Result<Vec<ContainerInfo>, RuntimeError>;

    /// Follow the combined stdout/stderr of a container, starting with `tail`
    /// historical lines. Dropping the stream releases the connection.
    fn follow_logs(
        &self,
        container_id: &str,
        tail: usize,
    ) -> BoxStream<'static, Result<LogFrame, RuntimeError>>;
}

/// [`ContainerRuntime`] backed by the Docker Engine API
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform default socket, or an explicit socket path
    pub fn connect(socket: Option<&str>) -> Result<Self, RuntimeError> {
        let docker = match socket {
            Some(path) => Docker::connect_with_socket(
                path,
                DOCKER_CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;

        Ok(Self { docker })
    }

    /// Check that the daemon answers
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::List(e.to_string()))?;

        Ok(containers
            .into_iter()
            .filter_map(|summary| {
                let id = summary.id?;
                Some(ContainerInfo::new(id, summary.names.unwrap_or_default()))
            })
            .collect())
    }

    fn follow_logs(
        &self,
        container_id: &str,
        tail: usize,
    ) -> BoxStream<'static, Result<LogFrame, RuntimeError>> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        self.docker
            .logs(container_id, Some(options))
            .map(|item| {
                item.map(LogFrame::from)
                    .map_err(|e| RuntimeError::Logs(e.to_string()))
            })
            .boxed()
    }
}
