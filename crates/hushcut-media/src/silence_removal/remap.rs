//! Remap original-timeline timestamps onto the edited timeline.
//!
//! An event at original time `t` moves earlier by the amount of silence cut
//! before it:
//!
//! ```text
//! removed(t)  = Σ over [s, e) with s < t of (min(e, t) - s)
//! adjusted(t) = max(0, t - removed(t))
//! ```
//!
//! An event exactly at a silence start loses nothing from that silence; an
//! event exactly at its end loses all of it.

use std::path::Path;

use hushcut_models::{
    parse_events, render_events, total_duration, Chunk, EditedChunk, SilenceReport, TimeInterval,
    TimestampEvent,
};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Difference between the remapper's and the editor's removed totals that
/// is still considered consistent.
const CROSS_CHECK_TOLERANCE_SECS: f64 = 0.01;

/// Silence removed from the original timeline, in chunk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CumulativeSilenceMap {
    intervals: Vec<TimeInterval>,
}

impl CumulativeSilenceMap {
    pub fn new(intervals: Vec<TimeInterval>) -> Self {
        Self { intervals }
    }

    /// Offset every report by its chunk's start and concatenate in chunk order.
    pub fn from_reports(chunks: &[Chunk], reports: &[SilenceReport]) -> MediaResult<Self> {
        let mut intervals = Vec::new();
        for chunk in chunks {
            let report = reports
                .iter()
                .find(|r| r.chunk_index == chunk.index)
                .ok_or(MediaError::MissingChunk { index: chunk.index })?;
            intervals.extend(report.to_original_timeline(chunk.start_offset));
        }
        Ok(Self { intervals })
    }

    pub fn intervals(&self) -> &[TimeInterval] {
        &self.intervals
    }

    /// Total seconds removed.
    pub fn total_removed(&self) -> f64 {
        total_duration(&self.intervals)
    }

    /// Seconds of silence removed strictly before `t`.
    pub fn removed_before(&self, t: f64) -> f64 {
        self.intervals
            .iter()
            .filter(|interval| interval.start < t)
            .map(|interval| interval.end.min(t) - interval.start)
            .sum()
    }

    /// Position of original time `t` on the edited timeline.
    pub fn adjust(&self, t: f64) -> f64 {
        (t - self.removed_before(t)).max(0.0)
    }

    /// Problems in the interval list that would skew remapping.
    pub fn diagnostics(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for interval in &self.intervals {
            if interval.is_degenerate() {
                problems.push(format!("degenerate interval {}", interval));
            }
        }
        for pair in self.intervals.windows(2) {
            if pair[1].start < pair[0].end {
                problems.push(format!("interval {} overlaps {}", pair[0], pair[1]));
            }
        }

        problems
    }
}

/// Remap events, preserving input order and labels.
pub fn remap_events(events: &[TimestampEvent], map: &CumulativeSilenceMap) -> Vec<TimestampEvent> {
    for problem in map.diagnostics() {
        warn!("Silence map: {}", problem);
    }

    events
        .iter()
        .map(|event| event.at(map.adjust(event.original_seconds)))
        .collect()
}

/// Drift between the map's total and the editors' reported removals, when it
/// exceeds tolerance.
pub fn cross_check(map: &CumulativeSilenceMap, edited: &[EditedChunk]) -> Option<f64> {
    let reported: f64 = edited.iter().map(|e| e.removed_duration).sum();
    let drift = map.total_removed() - reported;

    if drift.abs() > CROSS_CHECK_TOLERANCE_SECS {
        warn!(
            remapped = format!("{:.3}s", map.total_removed()),
            edited = format!("{:.3}s", reported),
            "Removed silence totals disagree"
        );
        return Some(drift);
    }
    None
}

/// Read an event file. Malformed lines are logged and skipped.
pub async fn read_events(path: &Path) -> MediaResult<Vec<TimestampEvent>> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let contents = tokio::fs::read_to_string(path).await?;
    let parsed = parse_events(&contents);

    for rejected in &parsed.rejected {
        let error = MediaError::TimestampFormat {
            line_number: rejected.line_number,
            reason: rejected.error.to_string(),
        };
        warn!("Skipping '{}': {}", rejected.content.trim(), error);
    }

    debug!(
        events = parsed.events.len(),
        rejected = parsed.rejected.len(),
        "Read timestamp file {}",
        path.display()
    );
    Ok(parsed.events)
}

/// Write events as `HH:MM:SS label` lines.
pub async fn write_events(path: &Path, events: &[TimestampEvent]) -> MediaResult<()> {
    tokio::fs::write(path, render_events(events)).await?;
    Ok(())
}
