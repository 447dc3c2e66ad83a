use std::fmt::Display;
use thiserror::Error;

pub mod codes;
pub mod helpers;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::{common, ErrorExt};

/// The error type for everything that can stop a log stream from starting.
///
/// Failures that happen once a stream is running are never reported through
/// this type; they are delivered as diagnostic lines inside the stream.
#[derive(Error, Debug)]
pub enum LogStreamError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Container runtime error: {message}")]
    Runtime {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Server error: {message}")]
    Server {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LogStreamError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a container runtime error with default code
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::runtime_with_code(ErrorCode::RUNTIME_GENERIC, message)
    }

    /// Create a container runtime error with specific code
    pub fn runtime_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Runtime {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a server error with default code
    pub fn server(message: impl Into<String>) -> Self {
        Self::server_with_code(ErrorCode::SERVER_GENERIC, message)
    }

    /// Create a server error with specific code
    pub fn server_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Runtime { source: src, .. }
            | Self::Server { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Runtime { message, .. }
            | Self::Server { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Runtime { .. } => 3,
            Self::Server { .. } => 4,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. } | Self::Runtime { code, .. } | Self::Server { code, .. } => {
                *code
            }
        }
    }

    /// Message without the code prefix, suitable for sending to a log viewer
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::Runtime { message, .. } => message.clone(),
            Self::Server { message, .. } => format!("Server error: {}", message),
        }
    }
}

/// Type alias for Results using LogStreamError
pub type Result<T> = std::result::Result<T, LogStreamError>;

impl From<toml::de::Error> for LogStreamError {
    fn from(err: toml::de::Error) -> Self {
        LogStreamError::config_with_code(ErrorCode::CONFIG_PARSE_ERROR, "Invalid TOML syntax")
            .with_source(err)
    }
}
