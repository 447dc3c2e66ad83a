use super::{ErrorCode, LogStreamError};
use std::path::Path;

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    fn to_config_error(self, message: impl Into<String>) -> Result<T, LogStreamError>;
    fn to_server_error(self, message: impl Into<String>) -> Result<T, LogStreamError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_config_error(self, message: impl Into<String>) -> Result<T, LogStreamError> {
        self.map_err(|e| LogStreamError::config(message).with_source(e))
    }

    fn to_server_error(self, message: impl Into<String>) -> Result<T, LogStreamError> {
        self.map_err(|e| LogStreamError::server(message).with_source(e))
    }
}

/// Helper functions for common error scenarios
pub mod common {
    use super::*;

    pub fn config_not_found(path: impl AsRef<Path>) -> LogStreamError {
        LogStreamError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
    }

    pub fn invalid_config_value(field: &str, reason: impl std::fmt::Display) -> LogStreamError {
        LogStreamError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            format!("Invalid value for '{}': {}", field, reason),
        )
    }

    pub fn bind_failed(addr: &str) -> LogStreamError {
        LogStreamError::server_with_code(
            ErrorCode::SERVER_BIND_FAILED,
            format!("Failed to bind {}", addr),
        )
    }
}
