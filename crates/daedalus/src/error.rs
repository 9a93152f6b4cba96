//! Application assembly errors.

use crate::lifecycle::LifecycleError;
use daedalus_config::ConfigError;
use daedalus_core::ErrorKind;
use daedalus_files::FileError;
use daedalus_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised while building or running an [`App`](crate::App).
#[derive(Debug, Error)]
pub enum AppError {
    /// The bootstrap document could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The file service could not be constructed.
    #[error(transparent)]
    Files(#[from] FileError),

    /// A startup or shutdown step failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// `start` was called on an application that is already running.
    #[error("application '{0}' is already started")]
    AlreadyStarted(String),
}

impl AppError {
    /// Returns the runtime error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Files(e) => e.kind(),
            Self::Telemetry(_) | Self::Lifecycle(_) | Self::AlreadyStarted(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Result type alias using [`AppError`].
pub type AppResult<T> = Result<T, AppError>;
