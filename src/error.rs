use std::fmt;

use thiserror::Error;

use crate::classify::ErrorClass;

/// Error reported by a [`Driver`](crate::driver::Driver) implementation.
///
/// This is the raw shape drivers hand back; it never leaves the crate boundary
/// without going through the [`ErrorClassifier`](crate::classify::ErrorClassifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Message exactly as the native library produced it.
    pub message: String,
    /// SQLSTATE or native error code, when the driver exposes one.
    pub code: Option<String>,
    /// Set when the driver (or the retry logic) knows the session is gone.
    pub connection_lost: bool,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            connection_lost: false,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn connection_lost(mut self) -> Self {
        self.connection_lost = true;
        self
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DriverError {}

/// Canonical driver failure: the original message plus its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    pub message: String,
    pub code: Option<String>,
    pub class: ErrorClass,
}

impl DatabaseError {
    #[must_use]
    pub fn new(err: DriverError, class: ErrorClass) -> Self {
        Self {
            message: err.message,
            code: err.code,
            class,
        }
    }

    /// The physical session was lost and the connection must not be reused.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        self.class == ErrorClass::Disconnect
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class == ErrorClass::TransientRetryable
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Error)]
pub enum SqlAdapterError {
    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Unknown prepared statement: {0}")]
    UnknownStatement(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlAdapterError {
    /// Whether this error came from a lost connection.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Database(err) if err.is_disconnect())
    }

    /// Borrow the canonical driver error, if this is one.
    #[must_use]
    pub fn as_database(&self) -> Option<&DatabaseError> {
        match self {
            Self::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<r2d2::Error> for SqlAdapterError {
    fn from(err: r2d2::Error) -> Self {
        SqlAdapterError::ConnectionError(format!("pool checkout failed: {err}"))
    }
}

impl From<serde_json::Error> for SqlAdapterError {
    fn from(err: serde_json::Error) -> Self {
        SqlAdapterError::ConfigError(err.to_string())
    }
}

pub type Result<T, E = SqlAdapterError> = std::result::Result<T, E>;
