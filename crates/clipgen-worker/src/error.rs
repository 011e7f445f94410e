//! Worker error types.

use thiserror::Error;

use clipgen_media::{Ineligible, MediaError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Media engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Source ineligible: {0}")]
    SourceIneligible(#[from] Ineligible),

    #[error("Inspection failed: {0}")]
    InspectionFailed(String),

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("Invalid content id: {0}")]
    InvalidContentId(String),

    #[error("Content store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Errors that end a job before any artifact is attempted.
    pub fn is_job_fatal(&self) -> bool {
        matches!(
            self,
            Self::EngineUnavailable(_)
                | Self::SourceIneligible(_)
                | Self::InspectionFailed(_)
                | Self::ContentNotFound(_)
                | Self::InvalidContentId(_)
        )
    }
}
