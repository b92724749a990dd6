//! Worker configuration.
//!
//! Environment variables (after `.env` is loaded) provide the defaults that
//! command-line arguments then override.

use std::path::PathBuf;

use hushcut_media::SilenceRemovalConfig;

/// Worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Pipeline settings before CLI overrides
    pub removal: SilenceRemovalConfig,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Progress channel capacity
    pub progress_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            removal: SilenceRemovalConfig::default(),
            log_json: false,
            progress_capacity: hushcut_media::progress::PROGRESS_CHANNEL_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source. Unparseable values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<f64>().ok());
        let flag = |key: &str| {
            lookup(key)
                .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false)
        };

        let defaults = Self::default();
        let mut removal = defaults.removal;

        if let Some(secs) = parsed("HUSHCUT_CHUNK_DURATION") {
            removal.chunk_duration_secs = secs;
        }
        if let Some(db) = parsed("HUSHCUT_DB_THRESHOLD") {
            removal.noise_threshold_db = db;
        }
        if let Some(secs) = parsed("HUSHCUT_BUFFER_DURATION") {
            removal.buffer_secs = secs;
        }
        if let Some(secs) = parsed("HUSHCUT_MIN_SILENCE") {
            removal.min_silence_secs = secs;
        }
        if let Some(jobs) = lookup("HUSHCUT_JOBS").and_then(|s| s.trim().parse().ok()) {
            removal.parallelism = jobs;
        }
        if let Some(max) = lookup("HUSHCUT_MAX_INLINE_SEGMENTS").and_then(|s| s.trim().parse().ok()) {
            removal.max_inline_segments = max;
        }
        removal.tool_timeout_secs = lookup("HUSHCUT_TOOL_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse().ok())
            .filter(|secs| *secs > 0);
        removal.keep_scratch = flag("HUSHCUT_KEEP_SCRATCH");
        removal.scratch_parent = lookup("HUSHCUT_SCRATCH_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        if let Some(crf) = lookup("HUSHCUT_CRF").and_then(|s| s.trim().parse().ok()) {
            removal.encoding.crf = crf;
        }
        if let Some(preset) = lookup("HUSHCUT_PRESET").filter(|s| !s.trim().is_empty()) {
            removal.encoding.preset = preset.trim().to_string();
        }
        if let Some(codec) = lookup("HUSHCUT_VIDEO_CODEC").filter(|s| !s.trim().is_empty()) {
            removal.encoding.codec = codec.trim().to_string();
        }

        Self {
            removal,
            log_json: lookup("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
            progress_capacity: lookup("HUSHCUT_PROGRESS_CAPACITY")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.progress_capacity),
        }
    }
}
