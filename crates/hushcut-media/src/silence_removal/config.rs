//! Configuration for silence removal.
//!
//! These parameters control how aggressively silence is detected and cut,
//! and how the chunked pipeline uses the machine.

use std::path::PathBuf;

use hushcut_models::EncodingSettings;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};
use crate::tool::DEFAULT_MAX_INLINE_SEGMENTS;

pub const DEFAULT_CHUNK_DURATION_SECS: f64 = 150.0;
pub const DEFAULT_NOISE_THRESHOLD_DB: f64 = -45.0;
pub const DEFAULT_BUFFER_SECS: f64 = 0.1;
pub const DEFAULT_MIN_SILENCE_SECS: f64 = 0.4;
pub const DEFAULT_PLACEHOLDER_SECS: f64 = 0.1;

/// Shortest accepted chunk duration in seconds.
pub const MIN_CHUNK_DURATION_SECS: f64 = 1.0;

/// Whether `secs` is usable as a chunk duration.
pub fn is_valid_chunk_duration(secs: f64) -> bool {
    secs.is_finite() && secs >= MIN_CHUNK_DURATION_SECS
}

/// Configuration for chunked silence removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceRemovalConfig {
    /// Length of each processing window in seconds.
    ///
    /// Bounds memory and per-invocation cost; the last chunk may be shorter.
    pub chunk_duration_secs: f64,

    /// Noise floor in dB below which audio counts as silence.
    ///
    /// - Lower values (-50 dB): only near-digital silence is cut
    /// - Default (-45 dB): quiet room tone is cut
    /// - Higher values (-35 dB): soft background music may be cut too
    pub noise_threshold_db: f64,

    /// Seconds of silence preserved at each edge of a cut.
    ///
    /// Prevents clipping word onsets and trailing consonants.
    pub buffer_secs: f64,

    /// Shortest silence, in seconds, that is worth cutting.
    pub min_silence_secs: f64,

    /// Length of the clip emitted for a chunk that is entirely silent.
    pub placeholder_secs: f64,

    /// Chunks processed concurrently.
    pub parallelism: usize,

    /// Maximum number of keep intervals before using a filter script file.
    ///
    /// FFmpeg command lines have length limits; very choppy audio with many
    /// cuts switches to `-filter_complex_script`.
    pub max_inline_segments: usize,

    /// Encoder used for trimmed chunks, placeholders and re-encoded assembly.
    pub encoding: EncodingSettings,

    /// Kill any single tool invocation running longer than this.
    pub tool_timeout_secs: Option<u64>,

    /// Leave the scratch directory on disk after the run.
    pub keep_scratch: bool,

    /// Directory in which the per-run scratch directory is created.
    /// Defaults to the system temp directory.
    pub scratch_parent: Option<PathBuf>,
}

impl Default for SilenceRemovalConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: DEFAULT_CHUNK_DURATION_SECS,
            noise_threshold_db: DEFAULT_NOISE_THRESHOLD_DB,
            buffer_secs: DEFAULT_BUFFER_SECS,
            min_silence_secs: DEFAULT_MIN_SILENCE_SECS,
            placeholder_secs: DEFAULT_PLACEHOLDER_SECS,
            parallelism: default_parallelism(),
            max_inline_segments: DEFAULT_MAX_INLINE_SEGMENTS,
            encoding: EncodingSettings::default(),
            tool_timeout_secs: None,
            keep_scratch: false,
            scratch_parent: None,
        }
    }
}

/// Available CPU parallelism, at least 1.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl SilenceRemovalConfig {
    /// Cuts more: suits fast-paced talk with little room tone.
    pub fn aggressive() -> Self {
        Self {
            noise_threshold_db: -35.0,
            buffer_secs: 0.05,
            min_silence_secs: 0.25,
            ..Self::default()
        }
    }

    /// Cuts less: only long, clearly silent pauses go.
    pub fn conservative() -> Self {
        Self {
            noise_threshold_db: -50.0,
            buffer_secs: 0.2,
            min_silence_secs: 1.0,
            ..Self::default()
        }
    }

    /// Take the detection settings (threshold, buffer, minimum silence) of
    /// `preset`, keeping everything else.
    pub fn with_detection_of(mut self, preset: &Self) -> Self {
        self.noise_threshold_db = preset.noise_threshold_db;
        self.buffer_secs = preset.buffer_secs;
        self.min_silence_secs = preset.min_silence_secs;
        self
    }

    pub fn with_chunk_duration(mut self, secs: f64) -> Self {
        self.chunk_duration_secs = secs;
        self
    }

    pub fn with_noise_threshold_db(mut self, db: f64) -> Self {
        self.noise_threshold_db = db;
        self
    }

    pub fn with_buffer(mut self, secs: f64) -> Self {
        self.buffer_secs = secs;
        self
    }

    pub fn with_min_silence(mut self, secs: f64) -> Self {
        self.min_silence_secs = secs;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Reject configurations before any tool is invoked.
    pub fn validate(&self) -> MediaResult<()> {
        if !is_valid_chunk_duration(self.chunk_duration_secs) {
            return Err(MediaError::validation(format!(
                "chunk duration must be >= {} seconds, got {}",
                MIN_CHUNK_DURATION_SECS, self.chunk_duration_secs
            )));
        }
        if !self.noise_threshold_db.is_finite() || self.noise_threshold_db > 0.0 {
            return Err(MediaError::validation(format!(
                "noise threshold must be <= 0 dB, got {}",
                self.noise_threshold_db
            )));
        }
        if !self.buffer_secs.is_finite() || self.buffer_secs < 0.0 {
            return Err(MediaError::validation(format!(
                "buffer must be >= 0 seconds, got {}",
                self.buffer_secs
            )));
        }
        if !self.min_silence_secs.is_finite() || self.min_silence_secs < 0.0 {
            return Err(MediaError::validation(format!(
                "minimum silence must be >= 0 seconds, got {}",
                self.min_silence_secs
            )));
        }
        if !self.placeholder_secs.is_finite() || self.placeholder_secs <= 0.0 {
            return Err(MediaError::validation(format!(
                "placeholder duration must be > 0 seconds, got {}",
                self.placeholder_secs
            )));
        }
        if self.parallelism == 0 {
            return Err(MediaError::validation("parallelism must be at least 1"));
        }
        if self.max_inline_segments == 0 {
            return Err(MediaError::validation("max inline segments must be at least 1"));
        }
        if self.tool_timeout_secs == Some(0) {
            return Err(MediaError::validation("tool timeout must be at least 1 second"));
        }
        self.encoding.validate().map_err(MediaError::validation)?;
        Ok(())
    }
}
