//! Timestamp normalization and hour bucketing.
//!
//! Price ticks and sentiment rows arrive with timestamps in several textual
//! encodings (with or without fractional seconds, with or without a trailing
//! zone marker, `T` or space as the date/time separator). Everything is
//! normalized to a naive wall-clock datetime and truncated to the hour before
//! it is used as an alignment key.

use chrono::{NaiveDateTime, Timelike};

/// Canonical textual form of a timestamp, also used as the hour-bucket key.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Error raised when a timestamp matches none of the recognized encodings.
///
/// This is fatal for the row or job being processed; there is no partial
/// recovery from a malformed timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourParseError {
    /// The raw input that failed to parse.
    pub input: String,
}

impl std::fmt::Display for HourParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unrecognized timestamp encoding: {:?}", self.input)
    }
}

impl std::error::Error for HourParseError {}

/// Parses a timestamp in any of the recognized textual encodings.
///
/// Accepted inputs all reduce to `YYYY-MM-DD HH:MM:SS` after normalization:
/// - `2024-01-02T09:00:00.123456+09:00`
/// - `2024-01-02 09:00:00Z`
/// - `2024-01-02 09:00:00`
///
/// Fractional seconds and zone markers are dropped, not converted; the
/// wall-clock reading is kept as-is.
///
/// # Errors
/// Returns `HourParseError` if the input matches none of the encodings.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, HourParseError> {
    let mut s = raw.trim().replace('T', " ");
    if let Some(idx) = s.find('.') {
        s.truncate(idx);
    }
    if let Some(idx) = s.find('+') {
        s.truncate(idx);
    }
    let s = s.trim_end_matches('Z').trim();

    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|_| HourParseError {
        input: raw.to_string(),
    })
}

/// Truncates a datetime to the top of its hour (minutes/seconds dropped).
///
/// Idempotent: truncating an already-truncated value yields the same value.
pub fn floor_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    // hour() is always a valid hour-of-day, so this cannot fail
    dt.date().and_hms_opt(dt.hour(), 0, 0).unwrap()
}

/// Parses a timestamp and truncates it to the hour in one step.
///
/// # Errors
/// Returns `HourParseError` if the input matches none of the encodings.
pub fn parse_hour(raw: &str) -> Result<NaiveDateTime, HourParseError> {
    parse_timestamp(raw).map(floor_to_hour)
}

/// Formats a datetime in the canonical textual form.
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Formats an hour-truncated datetime as an alignment key.
pub fn hour_key(dt: NaiveDateTime) -> String {
    format_timestamp(&floor_to_hour(dt))
}
