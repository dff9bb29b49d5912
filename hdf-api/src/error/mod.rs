//! Error handling module for the driver framework

use core::fmt;
use alloc::string::{String, ToString};
use alloc::format;

/// Common error type used throughout the driver framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid argument (empty names, malformed requests)
    InvalidArgument(String),
    /// Resource not found
    NotFound(String),
    /// A service with the same name is already registered
    AlreadyExists(String),
    /// Resource busy, including object pool exhaustion
    Busy(String),
    /// A hook the operation needs is not provided by the driver
    Unsupported(String),
    /// A driver's bind or init hook reported failure
    BindFailed(String),
    /// Configuration error
    ConfigError(String),
    /// Custom error with code and message
    Custom(i32, String),
}

impl Error {
    /// Stable status code reported back through the dispatch protocol
    pub fn status_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => -3,
            Error::NotFound(_) => -2,
            Error::AlreadyExists(_) => -8,
            Error::Busy(_) => -7,
            Error::Unsupported(_) => -4,
            Error::BindFailed(_) => -207,
            Error::ConfigError(_) => -5,
            Error::Custom(code, _) => *code,
        }
    }

    /// Whether the error only reports that something is not there yet
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            Error::Busy(msg) => write!(f, "Resource busy: {}", msg),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Error::Custom(code, msg) => write!(f, "Error {}: {}", code, msg),
        }
    }
}

impl core::error::Error for Error {}

/// Result type for operations that can fail
pub type Result<T> = core::result::Result<T, Error>;

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    /// Prefixes the message of the error while keeping its kind
    fn context(self, context: &str) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|error| match error {
            Error::InvalidArgument(msg) => Error::InvalidArgument(format!("{}: {}", context, msg)),
            Error::NotFound(msg) => Error::NotFound(format!("{}: {}", context, msg)),
            Error::AlreadyExists(msg) => Error::AlreadyExists(format!("{}: {}", context, msg)),
            Error::Busy(msg) => Error::Busy(format!("{}: {}", context, msg)),
            Error::Unsupported(msg) => Error::Unsupported(format!("{}: {}", context, msg)),
            Error::BindFailed(msg) => Error::BindFailed(format!("{}: {}", context, msg)),
            Error::ConfigError(msg) => Error::ConfigError(format!("{}: {}", context, msg)),
            Error::Custom(code, msg) => Error::Custom(code, format!("{}: {}", context, msg)),
        })
    }
}

/// Creates a new invalid argument error
pub fn invalid_argument(msg: &str) -> Error {
    Error::InvalidArgument(msg.to_string())
}

/// Creates a new not found error
pub fn not_found(msg: &str) -> Error {
    Error::NotFound(msg.to_string())
}

/// Creates a new already exists error
pub fn already_exists(msg: &str) -> Error {
    Error::AlreadyExists(msg.to_string())
}

/// Creates a new busy error
pub fn busy(msg: &str) -> Error {
    Error::Busy(msg.to_string())
}

/// Creates a new unsupported error
pub fn unsupported(msg: &str) -> Error {
    Error::Unsupported(msg.to_string())
}

/// Creates a new bind failed error
pub fn bind_failed(msg: &str) -> Error {
    Error::BindFailed(msg.to_string())
}

/// Creates a new config error
pub fn config_error(msg: &str) -> Error {
    Error::ConfigError(msg.to_string())
}

/// Creates a new custom error
pub fn custom(code: i32, msg: &str) -> Error {
    Error::Custom(code, msg.to_string())
}

/// Rejects empty names before they reach a registry structure
pub fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument(format!("{} name is empty", kind)));
    }
    Ok(())
}
