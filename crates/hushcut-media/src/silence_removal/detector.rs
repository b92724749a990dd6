//! Silence detection and normalization of detector output.
//!
//! FFmpeg's `silencedetect` prints events on stderr:
//!
//! ```text
//! [silencedetect @ 0x55d5c] silence_start: 12.48
//! [silencedetect @ 0x55d5c] silence_end: 15.02 | silence_duration: 2.54
//! ```
//!
//! The text is fed through a two-state machine that pairs starts with ends:
//!
//! ```text
//!            silence_start
//!   ┌──────┐ ────────────► ┌──────────────┐
//!   │ Idle │               │ OpenSilence  │ ── silence_start: replace start
//!   └──────┘ ◄──────────── └──────────────┘
//!            silence_end (emit span)
//! ```
//!
//! An end while idle is a recoverable parse error and a start left open at
//! the end of the text is dropped.

use hushcut_models::{normalize_intervals, Chunk, SilenceReport, TimeInterval};
use tracing::{debug, warn};

use super::config::SilenceRemovalConfig;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::tool::MediaTool;

const START_KEY: &str = "silence_start:";
const END_KEY: &str = "silence_end:";
const DURATION_KEY: &str = "silence_duration:";

/// A silence as reported by the detector, before buffering and clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSilence {
    pub start: f64,
    pub end: f64,
    /// `silence_duration` as printed by the detector, if present.
    pub reported_duration: Option<f64>,
}

impl RawSilence {
    /// Reported duration, falling back to `end - start`.
    pub fn duration(&self) -> f64 {
        self.reported_duration.unwrap_or(self.end - self.start)
    }
}

/// Result of parsing detector text.
#[derive(Debug, Default)]
pub struct ParsedDetection {
    pub silences: Vec<RawSilence>,
    /// Lines that were skipped. Always recoverable [`MediaError::Parse`].
    pub errors: Vec<MediaError>,
    /// A `silence_start` that never got an end.
    pub unterminated_start: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DetectorEvent {
    Start(f64),
    End {
        end: f64,
        duration: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Idle,
    OpenSilence { start: f64 },
}

/// Parse raw `silencedetect` output.
pub fn parse_detector_output(text: &str) -> ParsedDetection {
    let mut parsed = ParsedDetection::default();
    let mut state = ParserState::Idle;

    for line in text.lines() {
        let event = match parse_event(line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                parsed.errors.push(e);
                continue;
            }
        };

        state = match (state, event) {
            (ParserState::Idle, DetectorEvent::Start(start)) => ParserState::OpenSilence { start },
            (ParserState::OpenSilence { start: previous }, DetectorEvent::Start(start)) => {
                warn!(
                    previous = previous,
                    replacement = start,
                    "silence_start while a silence is open, replacing it"
                );
                ParserState::OpenSilence { start }
            }
            (ParserState::OpenSilence { start }, DetectorEvent::End { end, duration }) => {
                parsed.silences.push(RawSilence {
                    start,
                    end,
                    reported_duration: duration,
                });
                ParserState::Idle
            }
            (ParserState::Idle, DetectorEvent::End { .. }) => {
                parsed.errors.push(MediaError::Parse(format!(
                    "silence_end without silence_start: {}",
                    line.trim()
                )));
                ParserState::Idle
            }
        };
    }

    if let ParserState::OpenSilence { start } = state {
        parsed.unterminated_start = Some(start);
    }

    parsed
}

/// Parse one line into an event. Lines without detector keys are `None`.
fn parse_event(line: &str) -> MediaResult<Option<DetectorEvent>> {
    if let Some(rest) = value_after(line, START_KEY) {
        let start = parse_number(rest, line)?;
        return Ok(Some(DetectorEvent::Start(start)));
    }

    if let Some(rest) = value_after(line, END_KEY) {
        let end = parse_number(rest, line)?;
        let duration = match value_after(line, DURATION_KEY) {
            Some(value) => Some(parse_number(value, line)?),
            None => None,
        };
        return Ok(Some(DetectorEvent::End { end, duration }));
    }

    Ok(None)
}

fn value_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.find(key).map(|pos| &line[pos + key.len()..])
}

fn parse_number(rest: &str, line: &str) -> MediaResult<f64> {
    rest.split(|c: char| c.is_whitespace() || c == '|')
        .find(|token| !token.is_empty())
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .ok_or_else(|| MediaError::Parse(line.trim().to_string()))
}

/// Turn raw silences into clean chunk-local intervals.
///
/// A silence is discarded when its reported duration is below
/// `min_silence_secs`. Survivors shrink by `buffer_secs` on each side, are
/// clamped to `[0, chunk_duration]`, and are discarded when nothing is
/// left. The result is sorted and merged.
pub fn normalize_silences(
    silences: &[RawSilence],
    buffer_secs: f64,
    min_silence_secs: f64,
    chunk_duration: f64,
) -> Vec<TimeInterval> {
    let shrunk = silences
        .iter()
        .filter(|silence| silence.duration() >= min_silence_secs)
        .filter_map(|silence| {
            let start = (silence.start + buffer_secs).max(0.0);
            let end = (silence.end - buffer_secs).min(chunk_duration);
            (end > start).then(|| TimeInterval::new(start, end))
        })
        .collect();

    normalize_intervals(shrunk)
}

/// Runs the media tool's silence detector on chunks.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    noise_threshold_db: f64,
    buffer_secs: f64,
    min_silence_secs: f64,
}

impl SilenceDetector {
    pub fn new(noise_threshold_db: f64, buffer_secs: f64, min_silence_secs: f64) -> Self {
        Self {
            noise_threshold_db,
            buffer_secs,
            min_silence_secs,
        }
    }

    pub fn from_config(config: &SilenceRemovalConfig) -> Self {
        Self::new(
            config.noise_threshold_db,
            config.buffer_secs,
            config.min_silence_secs,
        )
    }

    /// Detect silence in one chunk.
    pub async fn detect<T: MediaTool + ?Sized>(
        &self,
        tool: &T,
        chunk: &Chunk,
    ) -> MediaResult<SilenceReport> {
        let output = tool
            .detect_silence(&chunk.path, self.noise_threshold_db, self.min_silence_secs)
            .await
            .map_err(|e| e.for_chunk(chunk.index))?;

        Ok(self.report_from_output(chunk, &output))
    }

    /// Build a report from detector text already captured for `chunk`.
    pub fn report_from_output(&self, chunk: &Chunk, output: &str) -> SilenceReport {
        let parsed = parse_detector_output(output);

        for error in &parsed.errors {
            warn!(chunk = chunk.index, "Skipping detector line: {}", error);
        }
        metrics::record_parse_errors(parsed.errors.len());

        if let Some(start) = parsed.unterminated_start {
            warn!(
                chunk = chunk.index,
                start = start,
                "Dropping silence_start with no matching silence_end"
            );
        }

        let intervals = normalize_silences(
            &parsed.silences,
            self.buffer_secs,
            self.min_silence_secs,
            chunk.duration,
        );

        debug!(
            chunk = chunk.index,
            raw = parsed.silences.len(),
            kept = intervals.len(),
            "Silence detection complete"
        );

        SilenceReport {
            chunk_index: chunk.index,
            intervals,
            chunk_duration: chunk.duration,
        }
    }
}
