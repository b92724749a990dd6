//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops unless the host
//! process installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const TOOL_INVOCATIONS_TOTAL: &str = "hushcut_tool_invocations_total";
    pub const TOOL_FAILURES_TOTAL: &str = "hushcut_tool_failures_total";
    pub const TOOL_DURATION_SECONDS: &str = "hushcut_tool_duration_seconds";

    pub const CHUNKS_PROCESSED_TOTAL: &str = "hushcut_chunks_processed_total";
    pub const SILENCE_REMOVED_SECONDS: &str = "hushcut_silence_removed_seconds";
    pub const DETECTOR_PARSE_ERRORS_TOTAL: &str = "hushcut_detector_parse_errors_total";

    pub const RUNS_COMPLETED_TOTAL: &str = "hushcut_runs_completed_total";
    pub const RUNS_FAILED_TOTAL: &str = "hushcut_runs_failed_total";
}

/// Record one external tool invocation.
pub fn record_tool_invocation(tool: &str, duration_secs: f64, success: bool) {
    counter!(names::TOOL_INVOCATIONS_TOTAL, "tool" => tool.to_string()).increment(1);
    histogram!(names::TOOL_DURATION_SECONDS, "tool" => tool.to_string()).record(duration_secs);
    if !success {
        counter!(names::TOOL_FAILURES_TOTAL, "tool" => tool.to_string()).increment(1);
    }
}

/// Record a finished chunk and how it was edited.
pub fn record_chunk_processed(outcome: &'static str, removed_secs: f64) {
    counter!(names::CHUNKS_PROCESSED_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::SILENCE_REMOVED_SECONDS).record(removed_secs);
}

/// Record skipped detector output lines.
pub fn record_parse_errors(count: usize) {
    if count > 0 {
        counter!(names::DETECTOR_PARSE_ERRORS_TOTAL).increment(count as u64);
    }
}

/// Record the end of a run.
pub fn record_run(success: bool) {
    if success {
        counter!(names::RUNS_COMPLETED_TOTAL).increment(1);
    } else {
        counter!(names::RUNS_FAILED_TOTAL).increment(1);
    }
}
