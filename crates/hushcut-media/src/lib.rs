#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and chunked silence removal.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a cancellable runner
//! - Stream probing via ffprobe
//! - The [`MediaTool`] seam the silence removal pipeline talks to
//! - Chunking, detection, editing, assembly and timestamp remapping

pub mod cancel;
pub mod command;
pub mod error;
pub mod fs_utils;
pub mod metrics;
pub mod probe;
pub mod progress;
pub mod silence_removal;
pub mod tool;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, ToolOutput};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, MediaInfo, StreamInfo, StreamKind, StreamLayout};
pub use progress::{channel as progress_channel, noop_sender, ProgressReceiver, ProgressSender};
pub use silence_removal::{
    remove_silence, RemovalOutcome, RemovalRequest, RunStats, SilenceRemovalConfig,
};
pub use tool::{ConcatMode, FfmpegTool, MediaTool, DEFAULT_MAX_INLINE_SEGMENTS};
