//! Progress event schema for UI consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage a progress event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Splitting the source into chunks
    Chunking,
    /// Running silence detection on a chunk
    Detecting,
    /// Trimming/splicing a chunk
    Editing,
    /// Concatenating edited chunks
    Assembling,
    /// Remapping external timestamps
    Remapping,
    /// Run finished successfully
    Complete,
    /// Run failed or was cancelled
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Chunking => "chunking",
            PipelineStage::Detecting => "detecting",
            PipelineStage::Editing => "editing",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Remapping => "remapping",
            PipelineStage::Complete => "complete",
            PipelineStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A progress update emitted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Chunk this event refers to, if any.
    pub chunk_index: Option<usize>,
    /// Number of chunks in the run (0 until chunking finishes).
    pub total_chunks: usize,
    pub stage: PipelineStage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Create a run-level event.
    pub fn run(stage: PipelineStage, total_chunks: usize, message: impl Into<String>) -> Self {
        Self {
            chunk_index: None,
            total_chunks,
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a chunk-level event.
    pub fn chunk(
        stage: PipelineStage,
        chunk_index: usize,
        total_chunks: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            chunk_index: Some(chunk_index),
            total_chunks,
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Rough completion percentage for progress bars.
    pub fn percent(&self) -> u8 {
        match self.stage {
            PipelineStage::Chunking => 0,
            PipelineStage::Detecting | PipelineStage::Editing => {
                match (self.chunk_index, self.total_chunks) {
                    (Some(idx), total) if total > 0 => {
                        let done = if self.stage == PipelineStage::Editing { idx + 1 } else { idx };
                        (5 + done * 85 / total).min(90) as u8
                    }
                    _ => 5,
                }
            }
            PipelineStage::Assembling | PipelineStage::Remapping => 90,
            PipelineStage::Complete => 100,
            PipelineStage::Failed => 0,
        }
    }
}
