/// Error code registry for logstream
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Container runtime errors
/// - 3000-3999: Server errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1003;
    pub const CONFIG_PATH_ERROR: u16 = 1004;

    // Container runtime errors (2000-2999)
    pub const RUNTIME_GENERIC: u16 = 2000;
    pub const RUNTIME_UNAVAILABLE: u16 = 2001;
    pub const RUNTIME_LIST_FAILED: u16 = 2002;
    pub const RUNTIME_LOGS_FAILED: u16 = 2003;

    // Server errors (3000-3999)
    pub const SERVER_GENERIC: u16 = 3000;
    pub const SERVER_BIND_FAILED: u16 = 3001;
    pub const SERVER_LOGGING_INIT: u16 = 3002;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Failed to parse configuration",
        1003 => "Invalid value in configuration",
        1004 => "Configuration path error",

        2000 => "Generic container runtime error",
        2001 => "Container runtime is unreachable",
        2002 => "Failed to list containers",
        2003 => "Failed to open container log stream",

        3000 => "Generic server error",
        3001 => "Failed to bind listen address",
        3002 => "Failed to initialize logging",

        _ => "Unknown error code",
    }
}
