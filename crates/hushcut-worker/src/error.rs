//! Worker error types.

use hushcut_media::MediaError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::Media(MediaError::Cancelled) => 130,
            WorkerError::ConfigError(_) | WorkerError::Media(MediaError::Validation(_)) => 2,
            _ => 1,
        }
    }

    /// Captured tool stderr, if the failure came from ffmpeg/ffprobe.
    pub fn tool_stderr(&self) -> Option<&str> {
        match self {
            WorkerError::Media(e) => e.stderr(),
            _ => None,
        }
    }
}
