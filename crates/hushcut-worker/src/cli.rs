//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use hushcut_media::silence_removal::default_output_path;
use hushcut_media::{RemovalRequest, SilenceRemovalConfig};
use tracing::level_filters::LevelFilter;

/// Detection presets.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// -35 dB, 0.05s buffer, cuts pauses from 0.25s
    Aggressive,
    /// -50 dB, 0.2s buffer, cuts pauses from 1s
    Conservative,
}

impl Profile {
    fn config(self) -> SilenceRemovalConfig {
        match self {
            Profile::Aggressive => SilenceRemovalConfig::aggressive(),
            Profile::Conservative => SilenceRemovalConfig::conservative(),
        }
    }
}

/// Remove silent stretches from a recording and shift chapter timestamps to match.
///
/// The input is cut into chunks that are processed in parallel, then joined back
/// together. Events in a timestamp file (`HH:MM:SS label` per line) are moved
/// to where they land in the shortened output.
#[derive(Parser, Debug, Clone)]
#[command(name = "hushcut", version, about, long_about = None)]
pub struct Args {
    /// Input media file
    pub input: PathBuf,

    /// Output file [default: <input stem>_no_silence.<ext>]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Detection preset; -d, -b and -m still override it
    #[arg(short, long, value_enum)]
    pub profile: Option<Profile>,

    /// Noise floor in dB below which audio counts as silence
    #[arg(short = 'd', long, allow_hyphen_values = true)]
    pub db_threshold: Option<f64>,

    /// Seconds of silence kept at each edge of a cut
    #[arg(short, long = "buffer-duration")]
    pub buffer_duration: Option<f64>,

    /// Processing chunk length in seconds
    #[arg(short, long)]
    pub chunk_duration: Option<f64>,

    /// Shortest silence worth cutting, in seconds
    #[arg(short, long)]
    pub min_silence: Option<f64>,

    /// Timestamp file on the original timeline
    #[arg(short, long)]
    pub timestamps: Option<PathBuf>,

    /// Adjusted timestamp file [default: <input stem>_no_silence_timestamps.txt]
    #[arg(long, requires = "timestamps")]
    pub output_timestamps: Option<PathBuf>,

    /// Chunks processed concurrently [default: CPU count]
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Leave the scratch directory on disk
    #[arg(long)]
    pub keep_scratch: bool,

    /// Verbose output (repeat for more verbosity: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Level for the `hushcut` targets.
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Layer explicit arguments over `base`.
    pub fn apply(&self, base: &SilenceRemovalConfig) -> SilenceRemovalConfig {
        let mut config = base.clone();
        if let Some(profile) = self.profile {
            config = config.with_detection_of(&profile.config());
        }
        if let Some(db) = self.db_threshold {
            config.noise_threshold_db = db;
        }
        if let Some(secs) = self.buffer_duration {
            config.buffer_secs = secs;
        }
        if let Some(secs) = self.chunk_duration {
            config.chunk_duration_secs = secs;
        }
        if let Some(secs) = self.min_silence {
            config.min_silence_secs = secs;
        }
        if let Some(jobs) = self.jobs {
            config.parallelism = jobs;
        }
        if self.keep_scratch {
            config.keep_scratch = true;
        }
        config
    }

    pub fn request(&self) -> RemovalRequest {
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input));
        let request = RemovalRequest::new(&self.input, output);

        match &self.timestamps {
            Some(timestamps) => request.with_timestamps(timestamps, self.output_timestamps.clone()),
            None => request,
        }
    }
}
