//! Fuel consumption and refueling
//!
//! Refuel and consumption are day-level rules, so a week or month bucket is
//! split into UTC days, each day is filtered and classified on its own, and
//! the daily figures are summed.

use serde::Serialize;

use super::{Analysis, BucketWindow, Domain, DomainAnalyzer};
use crate::config::{AnalyticsConfig, FuelSettings};
use crate::confidence::ConfidenceScorer;
use crate::events::{daily_consumption, detect_refuels};
use crate::filter::{remove_jitter, FuelSample};
use crate::reading::{Reading, ReadingField};
use crate::unit_conversion::fuel_percent_to_liters;

/// Fuel figures for one bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelSummary {
    /// Gauge level of the first reading (%)
    pub start_level_percent: f64,
    /// Gauge level of the last reading (%)
    pub end_level_percent: f64,
    /// Refuels detected
    pub refuel_count: usize,
    /// Fuel added (percent points)
    pub refueled_percent: f64,
    /// Fuel added (liters)
    pub refueled_liters: f64,
    /// Fuel used (percent points)
    pub consumed_percent: f64,
    /// Fuel used (liters)
    pub consumed_liters: f64,
    /// Distance covered (km)
    pub distance_km: f64,
    /// Distance per liter used, when both are non-zero
    pub km_per_liter: Option<f64>,
    /// Gauge samples discarded as jitter
    pub filtered_sample_count: usize,
}

/// Fuel domain strategy
#[derive(Debug, Clone)]
pub struct FuelAnalyzer {
    settings: FuelSettings,
    scorer: ConfidenceScorer,
}

impl FuelAnalyzer {
    /// Create an analyzer; the scorer supplies the consistency checks
    pub fn new(settings: FuelSettings, scorer: ConfidenceScorer) -> Self {
        Self { settings, scorer }
    }

    /// Create an analyzer from the fuel and confidence sections of the config
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(
            config.fuel.clone(),
            ConfidenceScorer::new(config.confidence.clone()),
        )
    }
}

impl DomainAnalyzer for FuelAnalyzer {
    type Summary = FuelSummary;

    fn domain(&self) -> Domain {
        Domain::Fuel
    }

    fn relevant_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::FuelLevel]
    }

    fn required_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::FuelLevel]
    }

    fn summarize(&self, window: &BucketWindow<'_>) -> Analysis<FuelSummary> {
        let mut summary = FuelSummary::default();
        let mut max_refuels_in_a_day = 0;

        for day in split_by_day(window.readings) {
            let samples: Vec<FuelSample> =
                day.iter().filter_map(FuelSample::from_reading).collect();
            let filtered = remove_jitter(&samples, self.settings.jitter_threshold);
            summary.filtered_sample_count += samples.len() - filtered.len();

            let refuels = detect_refuels(&filtered, &self.settings);
            let (daily, _) = daily_consumption(&filtered, &refuels, &self.settings);

            max_refuels_in_a_day = max_refuels_in_a_day.max(daily.refuel_count);
            summary.refuel_count += daily.refuel_count;
            summary.refueled_percent += daily.refueled_percent;
            summary.consumed_percent += daily.consumed_percent;
            summary.consumed_liters += daily.consumed_liters;
        }

        summary.start_level_percent = window
            .readings
            .first()
            .and_then(|r| r.fuel_level)
            .unwrap_or(0.0);
        summary.end_level_percent = window
            .readings
            .last()
            .and_then(|r| r.fuel_level)
            .unwrap_or(0.0);
        summary.refueled_liters =
            fuel_percent_to_liters(summary.refueled_percent, self.settings.tank_capacity_liters);
        summary.distance_km = window.distance_km();
        summary.km_per_liter = (summary.distance_km > 0.0 && summary.consumed_liters > 0.0)
            .then(|| summary.distance_km / summary.consumed_liters);

        let signals = vec![
            self.scorer
                .distance_consumption_signal(summary.distance_km, summary.consumed_liters),
            self.scorer.refuel_pattern_signal(
                summary.refuel_count,
                max_refuels_in_a_day,
                summary.consumed_liters,
            ),
        ];

        Analysis { summary, signals }
    }
}

/// Split time-ordered readings into runs sharing one UTC date
fn split_by_day(readings: &[Reading]) -> Vec<&[Reading]> {
    let mut days = Vec::new();
    let mut start = 0;
    for i in 1..=readings.len() {
        let boundary = i == readings.len()
            || readings[i].timestamp.date_naive() != readings[start].timestamp.date_naive();
        if boundary {
            days.push(&readings[start..i]);
            start = i;
        }
    }
    days
}
