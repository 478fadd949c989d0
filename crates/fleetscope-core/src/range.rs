//! Requested time ranges
//!
//! All ranges are inclusive on both ends and expressed in UTC so bucket
//! boundaries never drift with the device or client time zone.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while building a time range
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    /// A bound is neither a date nor an RFC 3339 instant
    #[error("Unparsable timestamp '{0}': expected YYYY-MM-DD or RFC 3339")]
    Unparsable(String),

    /// The bounds are inverted
    #[error("Range start {start} is after end {end}")]
    StartAfterEnd {
        /// Parsed start
        start: DateTime<Utc>,
        /// Parsed end
        end: DateTime<Utc>,
    },
}

/// Inclusive UTC time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// First instant of the range
    pub start: DateTime<Utc>,
    /// Last instant of the range
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::StartAfterEnd { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse range bounds from request parameters.
    ///
    /// Bare dates cover whole days: `start` begins at midnight and `end`
    /// runs to the last millisecond of its day. RFC 3339 values are used
    /// as given.
    pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
        let start = parse_bound(start, Bound::Start)?;
        let end = parse_bound(end, Bound::End)?;
        Self::new(start, end)
    }

    /// Range covering whole UTC days from `first` through `last`
    pub fn days(first: NaiveDate, last: NaiveDate) -> Result<Self, RangeError> {
        Self::new(start_of_day(first), end_of_day(last))
    }

    /// Check whether an instant falls inside the range
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(raw: &str, bound: Bound) -> Result<DateTime<Utc>, RangeError> {
    let trimmed = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| RangeError::Unparsable(raw.to_string()))?;

    Ok(match bound {
        Bound::Start => start_of_day(date),
        Bound::End => end_of_day(date),
    })
}

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last millisecond of `date` in UTC
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(last).and_utc()
}
