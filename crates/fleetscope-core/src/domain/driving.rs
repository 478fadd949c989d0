//! Driving behavior: distance, moving and idle time, speed and harsh events

use serde::Serialize;

use super::{Analysis, BucketWindow, Domain, DomainAnalyzer};
use crate::aggregate::Extrema;
use crate::config::{AnalyticsConfig, DrivingThresholds};
use crate::confidence::{plausibility_signal, Signal};
use crate::events::{count_by_kind, EventKind, RuleSet};
use crate::reading::ReadingField;
use crate::unit_conversion::seconds_to_hours;

/// Driving figures for one bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrivingSummary {
    /// Distance covered (km)
    pub distance_km: f64,
    /// Time spent moving (s)
    pub driving_time_seconds: f64,
    /// Time standing still with the engine running (s)
    pub idle_time_seconds: f64,
    /// Highest reported speed (km/h)
    pub max_speed_kph: f64,
    /// Moving distance over moving time (km/h)
    pub avg_moving_speed_kph: f64,
    /// Distance covered above the speed limit (km)
    pub speeding_distance_km: f64,
    /// Speeding events
    pub speeding_count: usize,
    /// Rapid acceleration events
    pub rapid_accel_count: usize,
    /// Rapid deceleration events
    pub rapid_decel_count: usize,
    /// Standstill to moving transitions
    pub trip_count: usize,
}

/// Driving domain strategy
pub struct DrivingAnalyzer {
    thresholds: DrivingThresholds,
    rules: RuleSet,
}

impl DrivingAnalyzer {
    /// Create an analyzer with the given thresholds
    pub fn new(thresholds: DrivingThresholds) -> Self {
        let rules = RuleSet::driving(&thresholds);
        Self { thresholds, rules }
    }

    /// Create an analyzer from the driving section of the config
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.driving.clone())
    }
}

impl DomainAnalyzer for DrivingAnalyzer {
    type Summary = DrivingSummary;

    fn domain(&self) -> Domain {
        Domain::Driving
    }

    fn relevant_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::Speed, ReadingField::Odometer]
    }

    fn required_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::Speed]
    }

    fn summarize(&self, window: &BucketWindow<'_>) -> Analysis<DrivingSummary> {
        let mut summary = DrivingSummary::default();
        let mut moving_distance_km = 0.0;
        let mut events = Vec::new();

        for delta in window.deltas {
            summary.distance_km += delta.distance_delta_km;

            if delta.spans_gap(self.thresholds.max_gap_seconds) {
                tracing::debug!(
                    "{} s gap after {} left out of driving time",
                    delta.elapsed_seconds,
                    delta.from.timestamp
                );
            } else if delta.counts_as_moving_time() {
                summary.driving_time_seconds += delta.elapsed_seconds;
                moving_distance_km += delta.distance_delta_km;
            } else if delta.from.is_engine_running() {
                summary.idle_time_seconds += delta.elapsed_seconds;
            }

            if delta.from.speed_or_zero() > self.thresholds.speed_limit_kph {
                summary.speeding_distance_km += delta.distance_delta_km;
            }
            if !delta.from.is_moving() && delta.to.is_moving() {
                summary.trip_count += 1;
            }
        }

        for delta in window.arrivals {
            events.extend(self.rules.classify(delta));
        }

        // A bucket that opens mid-trip still starts a trip
        if window.readings.first().is_some_and(|r| r.is_moving()) {
            summary.trip_count += 1;
        }

        let speeds: Extrema = window.readings.iter().filter_map(|r| r.speed).collect();
        summary.max_speed_kph = speeds.max().unwrap_or(0.0);

        let driving_hours = seconds_to_hours(summary.driving_time_seconds);
        if driving_hours > 0.0 {
            summary.avg_moving_speed_kph = moving_distance_km / driving_hours;
        }

        let counts = count_by_kind(&events);
        let count = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);
        summary.speeding_count = count(EventKind::Speeding);
        summary.rapid_accel_count = count(EventKind::RapidAccel);
        summary.rapid_decel_count = count(EventKind::RapidDecel);

        let signals = vec![
            distance_time_signal(summary.distance_km, summary.driving_time_seconds),
            plausibility_signal(
                summary.max_speed_kph,
                0.0,
                self.thresholds.plausible_max_speed_kph,
            ),
        ];

        Analysis { summary, signals }
    }
}

/// Distance without moving time, or moving time without distance, means the
/// odometer and speed sensors disagree
fn distance_time_signal(distance_km: f64, driving_time_seconds: f64) -> Signal {
    match (distance_km > 0.0, driving_time_seconds > 0.0) {
        (true, false) | (false, true) => Signal::Suspicious,
        _ => Signal::Agree,
    }
}
