//! Configuration for the log streaming service
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables.

use crate::error::{common, ErrorCode, ErrorExt, LogStreamError, Result};
use crate::logs::{
    DEFAULT_CONDUIT_CAPACITY, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_LINE_BYTES,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Valid log levels for configuration validation.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "LOGSTREAM_";

/// Get the default configuration file location
pub fn default_config_path() -> Result<PathBuf> {
    ProjectDirs::from("dev", "logstream", "logstream")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or_else(|| {
            LogStreamError::config_with_code(
                ErrorCode::CONFIG_PATH_ERROR,
                "Could not determine home directory",
            )
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Address the HTTP server listens on.
    pub bind_addr: String,
    /// Lines of application output kept for replay.
    pub history_capacity: usize,
    /// Per-subscriber queue depth; live lines beyond it are dropped for that subscriber.
    pub conduit_capacity: usize,
    /// History requested when a client does not ask for a specific tail.
    pub default_tail: usize,
    /// Longest container log line accepted before the stream is ended.
    pub max_line_bytes: usize,
    /// Keep ANSI colours in the application log lines sent to clients.
    pub ansi: bool,
    pub docker: DockerSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSettings {
    /// Stream container logs in addition to application logs.
    pub enabled: bool,
    /// Unix socket path; `DOCKER_HOST` or the platform default when unset.
    pub socket: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            conduit_capacity: DEFAULT_CONDUIT_CAPACITY,
            default_tail: 50,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            ansi: true,
            docker: DockerSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or the default location), apply the
    /// process environment, and validate.
    ///
    /// An explicit path must exist; a missing default file is fine.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(common::config_not_found(path));
                }
                Self::from_file(path)?
            }
            None => match default_config_path() {
                Ok(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.merge_env_vars(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .to_config_error(format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).map_err(|e| e.with_context(path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Values that fail to parse are left as they were; `validate` catches
    /// anything out of range.
    pub fn merge_env_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(addr) = var("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(value) = var("HISTORY_CAPACITY").and_then(|v| v.parse().ok()) {
            self.history_capacity = value;
        }
        if let Some(value) = var("CONDUIT_CAPACITY").and_then(|v| v.parse().ok()) {
            self.conduit_capacity = value;
        }
        if let Some(value) = var("DEFAULT_TAIL").and_then(|v| v.parse().ok()) {
            self.default_tail = value;
        }
        if let Some(value) = var("MAX_LINE_BYTES").and_then(|v| v.parse().ok()) {
            self.max_line_bytes = value;
        }
        if let Some(value) = var("ANSI").and_then(|v| v.parse().ok()) {
            self.ansi = value;
        }
        if let Some(socket) = var("DOCKER_SOCKET") {
            self.docker.socket = Some(socket);
        }

        if let Some(enabled) = var("DOCKER_ENABLED").and_then(|v| v.parse().ok()) {
            self.docker.enabled = enabled;
        } else if lookup("ENABLE_DOCKER_LOGS").as_deref() == Some("true") {
            self.docker.enabled = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(common::invalid_config_value(
                "log_level",
                format!("expected one of {}", VALID_LOG_LEVELS.join(", ")),
            ));
        }
        if !is_listen_address(&self.bind_addr) {
            return Err(common::invalid_config_value(
                "bind_addr",
                format!("'{}' is not a host:port address", self.bind_addr),
            ));
        }
        for (field, value) in [
            ("history_capacity", self.history_capacity),
            ("conduit_capacity", self.conduit_capacity),
            ("max_line_bytes", self.max_line_bytes),
        ] {
            if value == 0 {
                return Err(common::invalid_config_value(field, "must be greater than 0"));
            }
        }
        Ok(())
    }
}

/// `ip:port`, `[ipv6]:port` or `hostname:port`. Hostnames are resolved at bind time.
fn is_listen_address(addr: &str) -> bool {
    if addr.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match addr.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}
