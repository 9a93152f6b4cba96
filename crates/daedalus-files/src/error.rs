//! File service errors.

use daedalus_core::ErrorKind;
use thiserror::Error;

/// Result type for file service operations.
pub type FileResult<T> = Result<T, FileError>;

/// Errors raised by the file service and its stores.
#[derive(Debug, Error)]
pub enum FileError {
    /// No metadata record or blob exists for the id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A metadata record already exists for the id.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The declared size differs from the number of bytes read.
    #[error("size mismatch: declared {declared} bytes, read {actual}")]
    SizeMismatch {
        /// Size passed by the caller.
        declared: u64,
        /// Bytes actually read (at most one past `declared`).
        actual: u64,
    },

    /// The caller's reader failed.
    #[error("failed to read source: {0}")]
    Read(#[source] std::io::Error),

    /// A blob or metadata write failed.
    #[error("failed to write {target}: {source}")]
    Write {
        /// What was being written.
        target: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A blob or metadata record could not be loaded.
    #[error("failed to load {target}: {source}")]
    Load {
        /// What was being loaded.
        target: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored blob does not hash to its key.
    #[error("corrupted shard {0}")]
    Corrupted(String),

    /// A metadata record could not be encoded or decoded.
    #[error("metadata encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A string is not a valid content hash.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// The service configuration is invalid.
    #[error("invalid file service configuration: {0}")]
    Config(String),
}

impl FileError {
    /// Creates a write error.
    pub fn write(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Write {
            target: target.into(),
            source,
        }
    }

    /// Creates a load error.
    pub fn load(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Load {
            target: target.into(),
            source,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::InvalidHash(_) => ErrorKind::NotFound,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::Read(_) | Self::Load { .. } => ErrorKind::ReadError,
            Self::Write { .. } | Self::AlreadyExists(_) => ErrorKind::WriteError,
            Self::Config(_) => ErrorKind::ConfigInvalid,
            Self::Corrupted(_) | Self::Encoding(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` for [`FileError::AlreadyExists`].
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Returns `true` for [`ErrorKind::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

impl From<FileError> for daedalus_core::RuntimeError {
    fn from(error: FileError) -> Self {
        match error {
            FileError::NotFound(message) => Self::not_found(message),
            FileError::Config(message) => Self::config_invalid(message),
            other => Self::internal_with_source(other.to_string(), other),
        }
    }
}
