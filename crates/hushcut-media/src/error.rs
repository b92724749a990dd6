//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} not found in PATH")]
    ToolUnavailable { tool: String },

    #[error("{} failed{}: {}", .tool, chunk_suffix(.chunk_index), .message)]
    ToolInvocation {
        tool: String,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
        chunk_index: Option<usize>,
    },

    #[error("Unparseable detector output line: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Malformed timestamp on line {line_number}: {reason}")]
    TimestampFormat { line_number: usize, reason: String },

    #[error("Edited chunk {index} is missing")]
    MissingChunk { index: usize },

    #[error("Edited chunk {index} was supplied more than once")]
    DuplicateChunk { index: usize },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn chunk_suffix(chunk_index: &Option<usize>) -> String {
    chunk_index
        .map(|idx| format!(" on chunk {}", idx))
        .unwrap_or_default()
}

impl MediaError {
    pub fn tool_unavailable(tool: impl Into<String>) -> Self {
        Self::ToolUnavailable { tool: tool.into() }
    }

    /// Create a tool failure error.
    pub fn tool_failed(
        tool: impl Into<String>,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            message: message.into(),
            stderr,
            exit_code,
            chunk_index: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attach a chunk index to a tool failure; other variants pass through.
    pub fn for_chunk(self, index: usize) -> Self {
        match self {
            Self::ToolInvocation {
                tool,
                message,
                stderr,
                exit_code,
                ..
            } => Self::ToolInvocation {
                tool,
                message,
                stderr,
                exit_code,
                chunk_index: Some(index),
            },
            other => other,
        }
    }

    /// Captured tool stderr, when there is any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ToolInvocation { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// Chunk a tool failure happened on.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::ToolInvocation { chunk_index, .. } => *chunk_index,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Errors a run can continue past after logging.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::TimestampFormat { .. })
    }
}
