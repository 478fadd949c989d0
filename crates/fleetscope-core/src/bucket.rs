//! Calendar buckets
//!
//! Buckets follow UTC calendar boundaries. Weeks use the ISO-8601 week-year so
//! that the last days of December can belong to week 1 of the next year; the
//! key is an ordered tuple, so sorting never depends on label text.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::range::{end_of_day, start_of_day, TimeRange};

/// Bucket size selected by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One bucket per UTC day
    #[default]
    Day,
    /// One bucket per ISO week (Monday-Sunday)
    Week,
    /// One bucket per calendar month
    Month,
}

impl Granularity {
    /// Parse from a request parameter (`day`, `week`, `month`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "day" | "daily" => Some(Granularity::Day),
            "week" | "weekly" => Some(Granularity::Week),
            "month" | "monthly" => Some(Granularity::Month),
            _ => None,
        }
    }

    /// Every bucket touched by the range, in ascending order
    pub fn keys_in_range(&self, range: &TimeRange) -> Vec<BucketKey> {
        let first = BucketKey::containing(range.start, *self);
        let last = BucketKey::containing(range.end, *self);

        let mut keys = Vec::new();
        let mut current = Some(first);
        while let Some(key) = current {
            if key > last {
                break;
            }
            keys.push(key);
            current = key.next();
        }
        keys
    }

    /// Number of buckets the range would produce, without building them
    pub fn bucket_count(&self, range: &TimeRange) -> usize {
        let start = range.start.date_naive();
        let end = range.end.date_naive();
        match self {
            Granularity::Day => (end - start).num_days() as usize + 1,
            Granularity::Week => {
                let first = iso_monday(start);
                let last = iso_monday(end);
                (last - first).num_days() as usize / 7 + 1
            }
            Granularity::Month => {
                let months = (end.year() - start.year()) * 12 + end.month() as i32
                    - start.month() as i32;
                months as usize + 1
            }
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Week => write!(f, "week"),
            Granularity::Month => write!(f, "month"),
        }
    }
}

/// Sortable identity of one calendar bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    /// A single UTC day
    Day(NaiveDate),
    /// An ISO week within its ISO week-year
    Week {
        /// ISO week-year (may differ from the calendar year)
        iso_year: i32,
        /// ISO week number, 1-53
        week: u32,
    },
    /// A calendar month
    Month {
        /// Calendar year
        year: i32,
        /// Month, 1-12
        month: u32,
    },
}

impl BucketKey {
    /// Bucket containing the given instant
    pub fn containing(at: DateTime<Utc>, granularity: Granularity) -> Self {
        Self::for_date(at.date_naive(), granularity)
    }

    /// Bucket containing the given UTC date
    pub fn for_date(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Day => BucketKey::Day(date),
            Granularity::Week => {
                let iso = date.iso_week();
                BucketKey::Week {
                    iso_year: iso.year(),
                    week: iso.week(),
                }
            }
            Granularity::Month => BucketKey::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }

    /// Granularity this key belongs to
    pub fn granularity(&self) -> Granularity {
        match self {
            BucketKey::Day(_) => Granularity::Day,
            BucketKey::Week { .. } => Granularity::Week,
            BucketKey::Month { .. } => Granularity::Month,
        }
    }

    /// First day of the bucket
    pub fn first_day(&self) -> Option<NaiveDate> {
        match *self {
            BucketKey::Day(date) => Some(date),
            BucketKey::Week { iso_year, week } => {
                NaiveDate::from_isoywd_opt(iso_year, week, Weekday::Mon)
            }
            BucketKey::Month { year, month } => NaiveDate::from_ymd_opt(year, month, 1),
        }
    }

    /// Last day of the bucket
    pub fn last_day(&self) -> Option<NaiveDate> {
        let next_first = self.next()?.first_day()?;
        next_first.pred_opt()
    }

    /// Instants covered by the bucket
    pub fn span(&self) -> Option<TimeRange> {
        let first = self.first_day()?;
        let last = self.last_day()?;
        TimeRange::new(start_of_day(first), end_of_day(last)).ok()
    }

    /// The bucket that follows this one
    pub fn next(&self) -> Option<Self> {
        let first = self.first_day()?;
        let following = match self {
            BucketKey::Day(_) => first.succ_opt()?,
            BucketKey::Week { .. } => first.checked_add_days(chrono::Days::new(7))?,
            BucketKey::Month { .. } => first.checked_add_months(Months::new(1))?,
        };
        Some(Self::for_date(following, self.granularity()))
    }

    /// Human readable label: `2024-01-05`, `2024-W01` or `2024-01`
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            BucketKey::Week { iso_year, week } => write!(f, "{:04}-W{:02}", iso_year, week),
            BucketKey::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
        }
    }
}

fn iso_monday(date: NaiveDate) -> NaiveDate {
    let iso = date.iso_week();
    NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Mon).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_keys_cover_inclusive_range() {
        let range = TimeRange::parse("2024-01-01", "2024-01-07").unwrap();
        let keys = Granularity::Day.keys_in_range(&range);

        assert_eq!(keys.len(), 7);
        assert_eq!(keys[0].label(), "2024-01-01");
        assert_eq!(keys[6].label(), "2024-01-07");
        assert_eq!(Granularity::Day.bucket_count(&range), 7);
    }

    #[test]
    fn test_week_label_uses_iso_week_year() {
        // Monday 2024-12-30 belongs to ISO week 1 of 2025
        let key = BucketKey::for_date(date(2024, 12, 30), Granularity::Week);
        assert_eq!(key.label(), "2025-W01");

        // Sunday 2023-01-01 belongs to ISO week 52 of 2022
        let key = BucketKey::for_date(date(2023, 1, 1), Granularity::Week);
        assert_eq!(key.label(), "2022-W52");
    }

    #[test]
    fn test_week_keys_sort_across_year_boundary() {
        let range = TimeRange::parse("2024-12-16", "2025-01-12").unwrap();
        let keys = Granularity::Week.keys_in_range(&range);
        let labels: Vec<String> = keys.iter().map(BucketKey::label).collect();

        assert_eq!(labels, vec!["2024-W51", "2024-W52", "2025-W01", "2025-W02"]);

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, keys);
        assert_eq!(Granularity::Week.bucket_count(&range), 4);
    }

    #[test]
    fn test_month_keys_and_span() {
        let range = TimeRange::parse("2023-11-15", "2024-02-02").unwrap();
        let keys = Granularity::Month.keys_in_range(&range);
        let labels: Vec<String> = keys.iter().map(BucketKey::label).collect();

        assert_eq!(labels, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(Granularity::Month.bucket_count(&range), 4);

        let feb = keys[3];
        assert_eq!(feb.last_day(), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_week_span_is_monday_to_sunday() {
        let key = BucketKey::for_date(date(2024, 1, 3), Granularity::Week);
        assert_eq!(key.first_day(), Some(date(2024, 1, 1)));
        assert_eq!(key.last_day(), Some(date(2024, 1, 7)));
    }

    #[test]
    fn test_granularity_names() {
        assert_eq!(Granularity::from_name("Weekly"), Some(Granularity::Week));
        assert_eq!(Granularity::from_name("fortnight"), None);
    }
}
