//! # logstream
//!
//! Live log tailing for an administrative backend: the hosting process's own
//! output and the output of named Docker containers, pushed to any number of
//! subscribers with bounded memory.
//!
//! ## Modules
//!
//! - `logs` - Log sources, the in-process broadcaster and the container tailer
//! - `server` - Server-sent events endpoint over any log source
//! - `config` - Configuration loading and validation
//! - `logging` - Tracing setup that feeds the broadcaster
//! - `error` - Error types and codes
//! - `testing` - Mock container runtime for tests
pub mod config;
pub mod error;
pub mod logging;
pub mod logs;
pub mod server;

pub mod testing;

pub use error::{LogStreamError, Result};
pub use logs::{AppLogService, DockerLogService, LogRouter, LogSource, LogStream};
