//! Timestamp parsing and chapter-file handling.
//!
//! Event files hold one event per line: `<time> <label>`, where the time is
//! `SS`, `MM:SS` or `HH:MM:SS`, each optionally with fractional seconds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An externally supplied event on the original timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampEvent {
    /// Position in seconds.
    pub original_seconds: f64,
    /// Free-form label (chapter title, note).
    pub label: String,
}

impl TimestampEvent {
    pub fn new(original_seconds: f64, label: impl Into<String>) -> Self {
        Self {
            original_seconds,
            label: label.into(),
        }
    }

    /// Copy of this event moved to `seconds`, label untouched.
    pub fn at(&self, seconds: f64) -> Self {
        Self {
            original_seconds: seconds,
            label: self.label.clone(),
        }
    }

    /// Render as a `HH:MM:SS label` line.
    pub fn to_line(&self) -> String {
        if self.label.is_empty() {
            format_hms(self.original_seconds)
        } else {
            format!("{} {}", format_hms(self.original_seconds), self.label)
        }
    }
}

/// Total seconds for `SS`, `MM:SS` or `HH:MM:SS`.
///
/// Every part is plain digits; only the seconds part may carry a `.fraction`.
/// Minutes and seconds stay below 60 once a larger unit precedes them, so
/// `1:75` is an error rather than 135 s. A lone `SS` is unbounded.
///
/// ```
/// use hushcut_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("1:02:03.5").unwrap(), 3723.5);
/// assert_eq!(parse_timestamp("125").unwrap(), 125.0);
/// assert!(parse_timestamp("1:75").is_err());
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }
    if ts.starts_with('-') {
        return Err(TimestampError::Negative);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let names: &[&'static str] = match parts.len() {
        1 => &["seconds"],
        2 => &["minutes", "seconds"],
        3 => &["hours", "minutes", "seconds"],
        _ => return Err(TimestampError::InvalidFormat(ts.to_string())),
    };

    let last = parts.len() - 1;
    let mut total = 0.0;
    for (position, (part, &name)) in parts.iter().zip(names).enumerate() {
        let value = parse_part(part, position == last)
            .ok_or_else(|| TimestampError::InvalidValue(name, part.to_string()))?;
        if position > 0 && value >= 60.0 {
            return Err(TimestampError::OutOfRange(name, part.to_string()));
        }
        total = total * 60.0 + value;
    }

    Ok(total)
}

/// `digits` or, when `fractional`, `digits.digits`.
fn parse_part(part: &str, fractional: bool) -> Option<f64> {
    let (whole, fraction) = match part.split_once('.') {
        Some((whole, fraction)) if fractional => (whole, Some(fraction)),
        Some(_) => return None,
        None => (part, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !fraction.map_or(true, all_digits) {
        return None;
    }
    part.parse().ok()
}

/// Format seconds as `HH:MM:SS`, flooring fractional seconds.
pub fn format_hms(total_secs: f64) -> String {
    let whole = total_secs.max(0.0).floor() as u64;
    format!("{:02}:{:02}:{:02}", whole / 3600, (whole % 3600) / 60, whole % 60)
}

/// Parse one event line.
///
/// Returns `Ok(None)` for blank lines. A bare timestamp yields an empty label.
pub fn parse_event_line(line: &str) -> Result<Option<TimestampEvent>, TimestampError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (time, label) = match line.split_once(char::is_whitespace) {
        Some((time, label)) => (time, label.trim()),
        None => (line, ""),
    };

    let seconds = parse_timestamp(time)?;
    Ok(Some(TimestampEvent::new(seconds, label)))
}

/// A line that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedLine {
    /// 1-based line number.
    pub line_number: usize,
    pub content: String,
    pub error: TimestampError,
}

/// Result of parsing a whole event file.
#[derive(Debug, Clone, Default)]
pub struct ParsedEvents {
    /// Events in file order.
    pub events: Vec<TimestampEvent>,
    /// Lines dropped because they were malformed.
    pub rejected: Vec<RejectedLine>,
}

/// Parse an event file, keeping file order and collecting malformed lines.
pub fn parse_events(contents: &str) -> ParsedEvents {
    let mut parsed = ParsedEvents::default();

    for (idx, line) in contents.lines().enumerate() {
        match parse_event_line(line) {
            Ok(Some(event)) => parsed.events.push(event),
            Ok(None) => {}
            Err(error) => parsed.rejected.push(RejectedLine {
                line_number: idx + 1,
                content: line.to_string(),
                error,
            }),
        }
    }

    parsed
}

/// Render events back into file form, one line each.
pub fn render_events(events: &[TimestampEvent]) -> String {
    let mut out = String::new();
    for event in events {
        out.push_str(&event.to_line());
        out.push('\n');
    }
    out
}

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("{0} must be below 60, got {1}")]
    OutOfRange(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, MM:SS or SS (optionally with .mmm)")]
    InvalidFormat(String),
}
