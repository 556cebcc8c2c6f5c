use std::fmt;

use thiserror::Error;

/// MySQL `ER_CHECK_NOT_IMPLEMENTED`: the storage engine does not implement
/// the requested feature (non-transactional engines report BEGIN this way).
const ER_CHECK_NOT_IMPLEMENTED: u32 = 1178;
/// MySQL `ER_NOT_SUPPORTED_YET`.
const ER_NOT_SUPPORTED_YET: u32 = 1235;

/// Error reported by the underlying driver, with the original errno and
/// message preserved so upstream layers can classify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Driver errno, when the driver reported one.
    pub code: Option<u32>,
    /// Driver error message.
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Error without an errno (driver-side failures such as a lost socket).
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Whether this error means the storage backend lacks the requested
    /// feature, rather than the request itself being bad.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self.code,
            Some(ER_CHECK_NOT_IMPLEMENTED | ER_NOT_SUPPORTED_YET)
        )
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (errno {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DriverError {}

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Connect, reconnect or re-authentication could not establish a live
    /// session.
    #[error("connection failure: {0}")]
    Connection(#[source] DriverError),

    /// The driver rejected a prepared or direct execution.
    #[error("statement execution failed: {0}")]
    Execution(#[source] DriverError),

    #[error("configuration error: {0}")]
    Config(String),

    /// An operation that needs a live connection was called while
    /// disconnected.
    #[error("no active connection")]
    NotConnected,
}

impl AdapterError {
    /// The underlying driver error, when this error carries one.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            AdapterError::Connection(err) | AdapterError::Execution(err) => Some(err),
            AdapterError::Config(_) | AdapterError::NotConnected => None,
        }
    }
}
