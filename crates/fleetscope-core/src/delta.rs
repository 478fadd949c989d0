//! Delta computation
//!
//! Pairs each reading with its predecessor and derives elapsed time, speed
//! change, distance and fuel change. Readings arrive unordered and from
//! unreliable hardware, so the series is filtered and stable-sorted first.

use chrono::{DateTime, Utc};

use crate::range::TimeRange;
use crate::reading::{Reading, ReadingField};
use crate::unit_conversion::{meters_to_km, millis_to_seconds, seconds_to_hours};

/// Difference between two time-adjacent readings of one device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta<'a> {
    /// Earlier reading
    pub from: &'a Reading,
    /// Later reading
    pub to: &'a Reading,
    /// Seconds between the readings, never negative
    pub elapsed_seconds: f64,
    /// `to.speed - from.speed`, missing speeds count as 0
    pub speed_delta_kph: f64,
    /// Distance covered, never negative
    pub distance_delta_km: f64,
    /// `to.fuel_level - from.fuel_level` when both are known
    pub fuel_delta_percent: Option<f64>,
}

impl<'a> Delta<'a> {
    /// Compute the delta between two readings
    pub fn between(from: &'a Reading, to: &'a Reading) -> Self {
        let raw_elapsed = millis_to_seconds((to.timestamp - from.timestamp).num_milliseconds());
        // Duplicate or out-of-order timestamps collapse to zero
        let elapsed_seconds = raw_elapsed.max(0.0);

        let distance_delta_km = match (from.odometer, to.odometer) {
            // A negative difference is an odometer reset, not negative travel
            (Some(a), Some(b)) => meters_to_km(b - a).max(0.0),
            _ => {
                let avg_speed = (from.speed_or_zero() + to.speed_or_zero()) / 2.0;
                (avg_speed * seconds_to_hours(elapsed_seconds)).max(0.0)
            }
        };

        let fuel_delta_percent = match (from.fuel_level, to.fuel_level) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        };

        Self {
            from,
            to,
            elapsed_seconds,
            speed_delta_kph: to.speed_or_zero() - from.speed_or_zero(),
            distance_delta_km,
            fuel_delta_percent,
        }
    }

    /// The FROM reading was moving
    pub fn from_moving(&self) -> bool {
        self.from.is_moving()
    }

    /// Whether this delta adds to driving time
    pub fn counts_as_moving_time(&self) -> bool {
        self.elapsed_seconds > 0.0 && self.from_moving()
    }

    /// The readings are further apart than `max_gap_seconds`, so nothing is
    /// known about the time in between
    pub fn spans_gap(&self, max_gap_seconds: f64) -> bool {
        self.elapsed_seconds > max_gap_seconds
    }
}

/// Readings of one device prepared for delta computation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingSeries {
    /// Well-formed readings, ascending by timestamp
    pub readings: Vec<Reading>,
    /// Timestamps of readings dropped because they were malformed
    pub skipped_at: Vec<DateTime<Utc>>,
}

impl ReadingSeries {
    /// Filter and sort raw readings.
    ///
    /// Readings outside `range` are dropped silently; readings missing a
    /// required field or carrying non-finite values are dropped and counted in
    /// `skipped`. The sort is stable, so readings with equal timestamps keep
    /// their arrival order.
    pub fn prepare(raw: Vec<Reading>, range: &TimeRange, required: &[ReadingField]) -> Self {
        let mut skipped_at = Vec::new();
        let mut readings: Vec<Reading> = raw
            .into_iter()
            .filter(|r| range.contains(r.timestamp))
            .filter(|r| {
                let ok = r.is_well_formed(required);
                if !ok {
                    skipped_at.push(r.timestamp);
                }
                ok
            })
            .collect();

        readings.sort_by_key(|r| r.timestamp);
        skipped_at.sort();

        if !skipped_at.is_empty() {
            tracing::debug!(
                "Skipped {} malformed readings (required: {:?})",
                skipped_at.len(),
                required
            );
        }

        Self {
            readings,
            skipped_at,
        }
    }

    /// Number of malformed readings dropped
    pub fn skipped(&self) -> usize {
        self.skipped_at.len()
    }

    /// Number of usable readings
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Check if no usable readings remain
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Keep only the most recent usable reading, forgetting skipped ones
    pub fn into_latest(mut self) -> Self {
        Self {
            readings: self.readings.pop().into_iter().collect(),
            skipped_at: Vec::new(),
        }
    }

    /// Deltas between consecutive readings
    pub fn deltas(&self) -> Vec<Delta<'_>> {
        compute_deltas(&self.readings)
    }

    /// One delta ending at each reading, see [`arrival_deltas`]
    pub fn arrivals(&self) -> Vec<Delta<'_>> {
        arrival_deltas(&self.readings)
    }
}

/// Deltas between consecutive readings of an already sorted slice.
///
/// N readings yield N-1 deltas; zero or one reading yields none.
pub fn compute_deltas(readings: &[Reading]) -> Vec<Delta<'_>> {
    readings
        .windows(2)
        .map(|pair| Delta::between(&pair[0], &pair[1]))
        .collect()
}

/// One delta per reading of a sorted slice, ending at that reading.
///
/// Delta `i` ends at reading `i`. The first reading pairs with itself, so
/// rules on the TO reading still see it while its speed change, distance and
/// elapsed time are all zero.
pub fn arrival_deltas(readings: &[Reading]) -> Vec<Delta<'_>> {
    readings
        .first()
        .map(|first| Delta::between(first, first))
        .into_iter()
        .chain(readings.windows(2).map(|pair| Delta::between(&pair[0], &pair[1])))
        .collect()
}

/// Total distance over a sorted slice, computed directly from its deltas
pub fn total_distance_km(readings: &[Reading]) -> f64 {
    compute_deltas(readings)
        .iter()
        .map(|d| d.distance_delta_km)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_096_000 + secs, 0).unwrap()
    }

    fn reading(secs: i64, speed: Option<f64>, odometer: Option<f64>) -> Reading {
        Reading {
            speed,
            odometer,
            ..Reading::new("dev-1", at(secs))
        }
    }

    fn whole_day() -> TimeRange {
        TimeRange::parse("2024-01-01", "2024-01-01").unwrap()
    }

    #[test]
    fn test_n_readings_yield_n_minus_one_deltas() {
        let readings = vec![
            reading(0, Some(10.0), None),
            reading(10, Some(20.0), None),
            reading(20, Some(30.0), None),
        ];
        assert_eq!(compute_deltas(&readings).len(), 2);
        assert!(compute_deltas(&readings[..1]).is_empty());
        assert!(compute_deltas(&[]).is_empty());
    }

    #[test]
    fn test_arrivals_end_at_every_reading() {
        let readings = vec![
            reading(0, Some(10.0), Some(1000.0)),
            reading(10, Some(20.0), Some(1200.0)),
            reading(20, Some(30.0), Some(1500.0)),
        ];
        let arrivals = arrival_deltas(&readings);

        assert_eq!(arrivals.len(), 3);
        assert_eq!(arrivals[0].to.timestamp, at(0));
        assert_eq!(arrivals[0].elapsed_seconds, 0.0);
        assert_eq!(arrivals[0].speed_delta_kph, 0.0);
        assert_eq!(arrivals[0].distance_delta_km, 0.0);
        assert_eq!(arrivals[2].from.timestamp, at(10));
        assert_eq!(arrivals[2].to.timestamp, at(20));
        assert!(arrival_deltas(&[]).is_empty());
    }

    #[test]
    fn test_odometer_distance_preferred() {
        let a = reading(0, Some(60.0), Some(1_000.0));
        let b = reading(60, Some(60.0), Some(2_500.0));
        let delta = Delta::between(&a, &b);

        assert_eq!(delta.elapsed_seconds, 60.0);
        assert_eq!(delta.distance_delta_km, 1.5);
    }

    #[test]
    fn test_odometer_reset_contributes_zero() {
        let a = reading(0, Some(60.0), Some(250_000.0));
        let b = reading(60, Some(60.0), Some(100.0));

        assert_eq!(Delta::between(&a, &b).distance_delta_km, 0.0);
    }

    #[test]
    fn test_trapezoid_fallback_without_odometer() {
        let a = reading(0, Some(40.0), None);
        let b = reading(1800, Some(60.0), None);
        let delta = Delta::between(&a, &b);

        // average 50 km/h for half an hour
        assert!((delta.distance_delta_km - 25.0).abs() < 1e-9);
        assert_eq!(delta.speed_delta_kph, 20.0);
    }

    #[test]
    fn test_missing_speed_is_zero_for_delta_only() {
        let a = reading(0, None, None);
        let b = reading(10, Some(30.0), None);
        let delta = Delta::between(&a, &b);

        assert_eq!(delta.speed_delta_kph, 30.0);
        assert!(!delta.from_moving());
        assert_eq!(a.speed, None);
    }

    #[test]
    fn test_duplicate_timestamp_has_zero_elapsed() {
        let a = reading(5, Some(50.0), None);
        let b = reading(5, Some(55.0), None);
        let delta = Delta::between(&a, &b);

        assert_eq!(delta.elapsed_seconds, 0.0);
        assert!(!delta.counts_as_moving_time());
    }

    #[test]
    fn test_prepare_sorts_and_counts_malformed() {
        let raw = vec![
            reading(30, Some(30.0), None),
            reading(10, Some(10.0), None),
            reading(20, None, None),
            reading(0, Some(f64::INFINITY), None),
        ];

        let series = ReadingSeries::prepare(raw, &whole_day(), &[ReadingField::Speed]);

        assert_eq!(series.skipped(), 2);
        let speeds: Vec<f64> = series.readings.iter().map(Reading::speed_or_zero).collect();
        assert_eq!(speeds, vec![10.0, 30.0]);
    }

    #[test]
    fn test_prepare_is_stable_for_equal_timestamps() {
        let raw = vec![
            reading(10, Some(1.0), None),
            reading(10, Some(2.0), None),
            reading(0, Some(0.5), None),
        ];

        let series = ReadingSeries::prepare(raw, &whole_day(), &[]);
        let speeds: Vec<f64> = series.readings.iter().map(Reading::speed_or_zero).collect();
        assert_eq!(speeds, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_prepare_drops_out_of_range_without_counting() {
        let raw = vec![reading(0, Some(1.0), None), reading(86_400, Some(1.0), None)];
        let series = ReadingSeries::prepare(raw, &whole_day(), &[]);

        assert_eq!(series.len(), 1);
        assert_eq!(series.skipped(), 0);
    }

    #[test]
    fn test_into_latest_keeps_one_reading() {
        let raw = vec![
            reading(10, Some(1.0), None),
            reading(30, Some(3.0), None),
            reading(20, None, None),
        ];
        let latest = ReadingSeries::prepare(raw, &whole_day(), &[ReadingField::Speed]).into_latest();

        assert_eq!(latest.len(), 1);
        assert_eq!(latest.readings[0].speed, Some(3.0));
        assert_eq!(latest.skipped(), 0);
        assert!(latest.deltas().is_empty());
        assert!(ReadingSeries::default().into_latest().is_empty());
    }

    #[test]
    fn test_fuel_delta_requires_both_levels() {
        let a = Reading {
            fuel_level: Some(80.0),
            ..Reading::new("dev-1", at(0))
        };
        let b = Reading {
            fuel_level: Some(75.5),
            ..Reading::new("dev-1", at(60))
        };
        let c = Reading::new("dev-1", at(120));

        assert_eq!(Delta::between(&a, &b).fuel_delta_percent, Some(-4.5));
        assert_eq!(Delta::between(&b, &c).fuel_delta_percent, None);
    }
}
