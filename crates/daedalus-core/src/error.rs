//! Error types for Daedalus.
//!
//! This module provides [`ErrorKind`], the discriminant every error in the
//! runtime maps onto, and [`RuntimeError`], the error carried through
//! middleware chains.
//!
//! Crates with their own failure modes (file storage, configuration,
//! lifecycle) define dedicated `thiserror` enums and expose a `kind()`
//! accessor so callers can branch on the kind without matching on
//! crate-specific variants.
//!
//! | `ErrorKind` | Raised when |
//! |---|---|
//! | `NotFound` | a file id, metadata record or component is missing |
//! | `SizeMismatch` | declared size differs from bytes read |
//! | `ReadError` | a source reader failed |
//! | `WriteError` | a blob or metadata write failed |
//! | `ConfigInvalid` | a declarative entry could not be parsed |
//! | `FactoryMissing` | no factory is registered for a middleware entry |
//! | `Timeout` | a call exceeded its deadline |
//! | `Cancelled` | a call was cancelled before completion |
//! | `Internal` | anything else |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`RuntimeError`].
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Discriminable kind shared by every error surfaced by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A file id, metadata record or named component does not exist.
    NotFound,
    /// Declared size differs from the number of bytes read.
    SizeMismatch,
    /// The source reader failed.
    ReadError,
    /// A blob or metadata write failed.
    WriteError,
    /// A declarative configuration entry could not be parsed.
    ConfigInvalid,
    /// No factory is registered for a middleware entry.
    FactoryMissing,
    /// A call exceeded its deadline.
    Timeout,
    /// A call was cancelled.
    Cancelled,
    /// Any other failure.
    Internal,
}

impl ErrorKind {
    /// Returns the machine-readable code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::SizeMismatch => "SIZE_MISMATCH",
            Self::ReadError => "READ_ERROR",
            Self::WriteError => "WRITE_ERROR",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::FactoryMissing => "FACTORY_MISSING",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Standard error type flowing through middleware chains and handlers.
///
/// # Example
///
/// ```
/// use daedalus_core::{ErrorKind, RuntimeError};
///
/// fn lookup(name: &str) -> Result<(), RuntimeError> {
///     Err(RuntimeError::not_found(format!("component '{name}' is not registered")))
/// }
///
/// let err = lookup("db").unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// ```
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Declarative configuration could not be parsed.
    #[error("Invalid configuration: {message}")]
    ConfigInvalid {
        /// Human-readable error message.
        message: String,
    },

    /// No factory is registered for a middleware entry.
    #[error("No factory registered for '{name}'")]
    FactoryMissing {
        /// The type or name that was looked up.
        name: String,
    },

    /// The call exceeded its deadline.
    #[error("Timeout: {message}")]
    Timeout {
        /// Human-readable error message.
        message: String,
    },

    /// The call was cancelled.
    #[error("Cancelled: {message}")]
    Cancelled {
        /// Human-readable error message.
        message: String,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl RuntimeError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Creates a missing factory error.
    #[must_use]
    pub fn factory_missing(name: impl Into<String>) -> Self {
        Self::FactoryMissing { name: name.into() }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ConfigInvalid { .. } => ErrorKind::ConfigInvalid,
            Self::FactoryMissing { .. } => ErrorKind::FactoryMissing,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Converts this error to a serializable envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.kind().code().to_string(),
            kind: self.kind(),
            message: self.to_string(),
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Serializable error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Machine-readable error code.
    pub code: String,
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = RuntimeError::not_found("file abc");
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(error.to_string().contains("file abc"));
    }

    #[test]
    fn test_factory_missing_error() {
        let error = RuntimeError::factory_missing("jwt");
        assert_eq!(error.kind(), ErrorKind::FactoryMissing);
        assert_eq!(error.to_string(), "No factory registered for 'jwt'");
    }

    #[test]
    fn test_internal_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let error = RuntimeError::internal_with_source("write failed", io);
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_error_envelope_serialization() {
        let error = RuntimeError::timeout("deadline exceeded");
        let envelope = error.to_envelope(Some("req-456"));

        let json = serde_json::to_string(&envelope).expect("serialization should work");
        assert!(json.contains("\"code\":\"TIMEOUT\""));
        assert!(json.contains("\"kind\":\"timeout\""));
        assert!(json.contains("\"request_id\":\"req-456\""));
    }

    #[test]
    fn test_kind_codes_are_unique() {
        let kinds = [
            ErrorKind::NotFound,
            ErrorKind::SizeMismatch,
            ErrorKind::ReadError,
            ErrorKind::WriteError,
            ErrorKind::ConfigInvalid,
            ErrorKind::FactoryMissing,
            ErrorKind::Timeout,
            ErrorKind::Cancelled,
            ErrorKind::Internal,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }
}
