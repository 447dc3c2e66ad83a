//! Live log streaming
//!
//! Two backends sit behind the [`LogSource`] trait: [`AppLogService`], a
//! ring-buffered broadcaster for the hosting process's own output, and
//! [`DockerLogService`], which follows the output of a running container.
//! [`LogRouter`] picks one per request by logical service name.

pub mod app;
pub mod docker;
pub mod frame;
pub mod history;
pub mod router;
pub mod runtime;
pub mod sink;
pub mod source;
pub mod types;


pub use app::AppLogService;
pub use docker::{find_container, DockerLogService};
pub use frame::{strip_stream_header, LineSplitter, StreamKind, STREAM_HEADER_LEN};
pub use history::HistoryBuffer;
pub use router::LogRouter;
pub use runtime::{ContainerInfo, ContainerRuntime, DockerRuntime, LogFrame, RuntimeError};
pub use sink::{LineSinkWriter, LogSink};
pub use source::LogSource;
pub use types::{
    LogStream, APPLICATION_SERVICE, DEFAULT_CONDUIT_CAPACITY, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_MAX_LINE_BYTES,
};
