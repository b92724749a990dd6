//! Chunked silence removal with timestamp remapping.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Source media │───►│ Chunker      │───►│ Detector     │──┐ per chunk,
//! │              │    │ (segment)    │    │ silencedetect│  │ bounded pool
//! └──────────────┘    └──────────────┘    └──────────────┘  │
//!                                                ▼          │
//!                     ┌──────────────┐    ┌──────────────┐  │
//!                     │ Assembler    │◄───│ Editor       │◄─┘
//!                     │ (concat)     │    │ trim+splice  │
//!                     └──────────────┘    └──────────────┘
//!                            ▲ concurrently
//!                     ┌──────────────┐
//!                     │ Remapper     │ (original → edited timestamps)
//!                     └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use hushcut_media::silence_removal::{remove_silence, RemovalRequest, SilenceRemovalConfig};
//!
//! let request = RemovalRequest::new("talk.mp4", "talk_no_silence.mp4");
//! let outcome = remove_silence(&tool, &request, &SilenceRemovalConfig::default(), &progress, &cancel).await?;
//! ```

mod assembler;
mod chunker;
mod config;
mod detector;
mod editor;
mod pipeline;
mod remap;
mod scratch;
mod segmenter;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{assemble, order_chunks};
pub use chunker::{assign_offsets, contiguity_drift, split};
pub use config::{
    default_parallelism, is_valid_chunk_duration, SilenceRemovalConfig, DEFAULT_BUFFER_SECS,
    DEFAULT_CHUNK_DURATION_SECS, DEFAULT_MIN_SILENCE_SECS, DEFAULT_NOISE_THRESHOLD_DB,
    DEFAULT_PLACEHOLDER_SECS, MIN_CHUNK_DURATION_SECS,
};
pub use detector::{normalize_silences, parse_detector_output, ParsedDetection, RawSilence, SilenceDetector};
pub use editor::{EditKind, SegmentEditor};
pub use pipeline::{
    default_output_path, default_timestamps_output_path, remove_silence, RemovalOutcome,
    RemovalRequest, RunStats,
};
pub use remap::{cross_check, read_events, remap_events, write_events, CumulativeSilenceMap};
pub use scratch::ScratchDir;
pub use segmenter::{compute_segment_stats, keep_intervals, SegmentStats};
