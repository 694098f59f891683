//! Seconds-since-midnight time representation and the `HH:MM:SS` parser.
//!
//! Times are plain `i64` rather than a wrapper struct: the scanner and the
//! multi-day stitcher (`query.rs`) shift times by a full day in either
//! direction, and a signed integer lets those shifts stay arithmetic instead
//! of needing a fallible rebase. `HH` may exceed 23 to express post-midnight
//! service on the same service day, per GTFS convention.

use std::collections::HashMap;

/// Seconds since midnight of the service day. May be negative after a
/// multi-day shift, or `>= 86_400` for post-midnight trips.
pub type Time = i64;

/// Sentinel for "unreached" in a forward (earliest-arrival) scan.
///
/// Not `i64::MAX`: the scanner adds interchange and transfer durations to
/// this value while probing candidates, and `i64::MAX + n` would overflow.
pub const TIME_POS_INFINITY: Time = i64::MAX / 2;

/// Sentinel for "unreached" in a reverse (latest-departure) scan.
pub const TIME_NEG_INFINITY: Time = i64::MIN / 2;

/// A day.second duration, always non-negative.
pub type Duration = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeParseError {
    InvalidFormat,
    ParseInt,
}

impl std::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeParseError::InvalidFormat => write!(f, "time should use format HH:MM:SS"),
            TimeParseError::ParseInt => write!(f, "non-numeric component in time string"),
        }
    }
}

impl std::error::Error for TimeParseError {}

/// Parses a single `HH:MM:SS` string. `HH` may be any non-negative integer,
/// including values `>= 24` for post-midnight trips. Minutes and seconds
/// must be in `0..60`.
fn parse_hms(s: &str) -> Result<Time, TimeParseError> {
    let mut parts = s.trim().splitn(3, ':');
    let (h, m, sec) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(sec)) => (h, m, sec),
        _ => return Err(TimeParseError::InvalidFormat),
    };

    let hours: i64 = h.parse().map_err(|_| TimeParseError::ParseInt)?;
    let minutes: i64 = m.parse().map_err(|_| TimeParseError::ParseInt)?;
    let seconds: i64 = sec.parse().map_err(|_| TimeParseError::ParseInt)?;

    if !(0..60).contains(&minutes) || !(0..60).contains(&seconds) || hours < 0 {
        return Err(TimeParseError::InvalidFormat);
    }

    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// Caches the string -> seconds-since-midnight conversion, since the same
/// handful of distinct clock strings repeat across tens of thousands of
/// stop-times in a real feed.
///
/// Entry point for building a timetable from a source of raw `HH:MM:SS`
/// strings rather than already-parsed integers — the `gtfs_structures`
/// adapter never needs it, since that crate parses `stop_times.txt` down
/// to seconds-since-midnight before this crate ever sees it.
#[derive(Debug, Default)]
pub struct TimeParser {
    cache: HashMap<String, Time>,
}

impl TimeParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&mut self, s: &str) -> Result<Time, TimeParseError> {
        if let Some(&t) = self.cache.get(s) {
            return Ok(t);
        }
        let t = parse_hms(s)?;
        self.cache.insert(s.to_owned(), t);
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordinary_times() {
        let mut p = TimeParser::new();
        assert_eq!(p.parse("08:00:00").unwrap(), 28_800);
        assert_eq!(p.parse("00:00:00").unwrap(), 0);
        assert_eq!(p.parse("23:59:59").unwrap(), 86_399);
    }

    #[test]
    fn parses_post_midnight_hours() {
        let mut p = TimeParser::new();
        assert_eq!(p.parse("25:00:00").unwrap(), 90_000);
        assert_eq!(p.parse("30:15:00").unwrap(), 108_900);
    }

    #[test]
    fn caches_repeated_strings() {
        let mut p = TimeParser::new();
        p.parse("08:00:00").unwrap();
        assert_eq!(p.cache.len(), 1);
        p.parse("08:00:00").unwrap();
        assert_eq!(p.cache.len(), 1);
    }

    #[test]
    fn rejects_malformed_strings() {
        let mut p = TimeParser::new();
        assert!(p.parse("8:00").is_err());
        assert!(p.parse("08:60:00").is_err());
        assert!(p.parse("08:00:60").is_err());
        assert!(p.parse("ab:cd:ef").is_err());
    }
}
