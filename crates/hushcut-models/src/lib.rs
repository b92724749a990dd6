//! Shared data models for hushcut.
//!
//! This crate provides Serde-serializable types for:
//! - Time intervals (silent and kept spans)
//! - Chunks, silence reports and edited chunks
//! - Re-encoding settings
//! - Timestamp events and chapter-file parsing
//! - Progress events for UI consumers

pub mod chunk;
pub mod encoding;
pub mod interval;
pub mod progress;
pub mod timestamp;

// Re-export common types
pub use chunk::{Chunk, EditedChunk, SilenceReport};
pub use encoding::EncodingSettings;
pub use interval::{normalize_intervals, total_duration, TimeInterval};
pub use progress::{PipelineStage, ProgressEvent};
pub use timestamp::{
    format_hms, parse_event_line, parse_events, parse_timestamp, render_events, ParsedEvents,
    RejectedLine, TimestampError, TimestampEvent,
};
