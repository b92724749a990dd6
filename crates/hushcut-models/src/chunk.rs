//! Per-chunk pipeline values.
//!
//! Each value is produced by exactly one stage and handed on unchanged.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::interval::{total_duration, TimeInterval};

/// A contiguous slice of the source media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the source, starting at 0.
    pub index: usize,
    /// Chunk file in the scratch directory.
    pub path: PathBuf,
    /// Seconds into the original media where this chunk starts.
    pub start_offset: f64,
    /// Probed duration in seconds.
    pub duration: f64,
}

impl Chunk {
    /// Original-timeline end of this chunk.
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.duration
    }
}

/// Normalized silence found in one chunk, in chunk-local seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilenceReport {
    pub chunk_index: usize,
    /// Sorted, non-overlapping silent spans.
    pub intervals: Vec<TimeInterval>,
    /// Probed chunk duration.
    pub chunk_duration: f64,
}

impl SilenceReport {
    pub fn empty(chunk_index: usize, chunk_duration: f64) -> Self {
        Self {
            chunk_index,
            intervals: Vec::new(),
            chunk_duration,
        }
    }

    pub fn has_silence(&self) -> bool {
        !self.intervals.is_empty()
    }

    /// Total silent seconds.
    pub fn total_silence(&self) -> f64 {
        total_duration(&self.intervals)
    }

    /// Intervals shifted onto the original timeline.
    pub fn to_original_timeline(&self, start_offset: f64) -> Vec<TimeInterval> {
        self.intervals
            .iter()
            .map(|interval| interval.offset(start_offset))
            .collect()
    }
}

/// The edited output for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditedChunk {
    pub chunk_index: usize,
    pub path: PathBuf,
    /// Seconds of silence cut from this chunk.
    pub removed_duration: f64,
}
