//! Time spans in seconds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A span of media time, either silent or kept.
///
/// Coordinates are seconds in whichever timeline the owner uses (chunk-local
/// for detector output, original-timeline after offsetting).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length in seconds; zero for inverted spans.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// True when the span has no positive length.
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    /// Shift both ends by `offset` seconds.
    pub fn offset(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// Whether this span overlaps `other` by a positive amount.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}s - {:.3}s]", self.start, self.end)
    }
}

/// Sum of interval durations.
pub fn total_duration(intervals: &[TimeInterval]) -> f64 {
    intervals.iter().map(TimeInterval::duration).sum()
}

/// Sort by start and merge overlapping or touching spans, dropping degenerate ones.
pub fn normalize_intervals(mut intervals: Vec<TimeInterval>) -> Vec<TimeInterval> {
    intervals.retain(|i| !i.is_degenerate());
    intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}
