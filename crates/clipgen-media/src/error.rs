//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use clipgen_models::ClipSpecError;

use crate::engine::EngineFault;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} unavailable: {fault}")]
    EngineUnavailable {
        tool: &'static str,
        fault: EngineFault,
    },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("FFprobe command failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Failed to parse probe report: {0}")]
    ParseFailed(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFmpeg produced no output at {}", .path.display())]
    OutputMissing {
        path: PathBuf,
        command: String,
        stderr: String,
    },

    #[error("Invalid clip parameters: {0}")]
    InvalidSpec(String),

    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("Encoder not supported by this FFmpeg build: {0}")]
    UnsupportedCodec(String),

    #[error("Scene analysis found no change points")]
    NoScenesDetected,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Create an invalid media error.
    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    /// Check if the engine itself is missing or broken.
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, MediaError::EngineUnavailable { .. })
    }
}

impl From<ClipSpecError> for MediaError {
    fn from(e: ClipSpecError) -> Self {
        MediaError::InvalidSpec(e.to_string())
    }
}
