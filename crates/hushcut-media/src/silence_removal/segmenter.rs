//! Keep/Cut algebra for one chunk.
//!
//! Given sorted, non-overlapping silent intervals inside `[0, duration]`, the
//! keep intervals are their complement:
//!
//! ```text
//! 0          s0    e0        s1   e1             duration
//! |--- keep ---|cut|-- keep --|cut |---- keep ----|
//! ```

use hushcut_models::{total_duration, TimeInterval};

/// Complement of `silences` within `[0, duration]`.
///
/// Spans with `end <= start` are dropped, so a silence touching either edge
/// of the chunk leaves no empty keep behind.
pub fn keep_intervals(silences: &[TimeInterval], duration: f64) -> Vec<TimeInterval> {
    let mut keep = Vec::with_capacity(silences.len() + 1);
    let mut cursor = 0.0;

    for silence in silences {
        keep.push(TimeInterval::new(cursor, silence.start));
        cursor = silence.end;
    }
    keep.push(TimeInterval::new(cursor, duration));

    keep.retain(|interval| !interval.is_degenerate());
    keep
}

/// Statistics about Keep/Cut segments.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStats {
    pub keep_count: usize,
    pub cut_count: usize,
    /// Total kept seconds.
    pub keep_secs: f64,
    /// Total cut seconds.
    pub cut_secs: f64,
    /// Ratio of kept content (0.0 to 1.0).
    pub keep_ratio: f64,
}

/// Calculate statistics for a chunk's edit.
pub fn compute_segment_stats(keep: &[TimeInterval], silences: &[TimeInterval]) -> SegmentStats {
    let keep_secs = total_duration(keep);
    let cut_secs = total_duration(silences);
    let total = keep_secs + cut_secs;

    SegmentStats {
        keep_count: keep.len(),
        cut_count: silences.len(),
        keep_secs,
        cut_secs,
        keep_ratio: if total > 0.0 { keep_secs / total } else { 1.0 },
    }
}
