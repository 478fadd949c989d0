//! Battery health

use serde::Serialize;

use super::{Analysis, BucketWindow, Domain, DomainAnalyzer};
use crate::aggregate::{Extrema, WeightedMean};
use crate::config::{AnalyticsConfig, BatteryThresholds};
use crate::confidence::{plausibility_signal, Signal};
use crate::events::{EventKind, RuleSet};
use crate::reading::ReadingField;

/// Battery figures for one bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatterySummary {
    /// Lowest voltage (V)
    pub min_voltage: f64,
    /// Highest voltage (V)
    pub max_voltage: f64,
    /// Mean voltage over the readings (V)
    pub avg_voltage: f64,
    /// First minus last voltage (V); positive while draining
    pub voltage_drop: f64,
    /// Low voltage events
    pub low_voltage_count: usize,
    /// Mean current, when reported (A)
    pub avg_current: Option<f64>,
    /// Highest temperature, when reported (°C)
    pub max_temperature_c: Option<f64>,
}

/// Battery domain strategy
pub struct BatteryAnalyzer {
    thresholds: BatteryThresholds,
    rules: RuleSet,
}

impl BatteryAnalyzer {
    /// Create an analyzer with the given thresholds
    pub fn new(thresholds: BatteryThresholds) -> Self {
        let rules = RuleSet::battery(&thresholds);
        Self { thresholds, rules }
    }

    /// Create an analyzer from the battery section of the config
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.battery.clone())
    }
}

impl DomainAnalyzer for BatteryAnalyzer {
    type Summary = BatterySummary;

    fn domain(&self) -> Domain {
        Domain::Battery
    }

    fn relevant_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::Voltage, ReadingField::Current]
    }

    fn required_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::Voltage]
    }

    fn summarize(&self, window: &BucketWindow<'_>) -> Analysis<BatterySummary> {
        let voltages: Vec<f64> = window.readings.iter().filter_map(|r| r.voltage).collect();
        let extrema: Extrema = voltages.iter().copied().collect();
        let mean: WeightedMean = voltages.iter().copied().collect();
        let current: WeightedMean = window.readings.iter().filter_map(|r| r.current).collect();
        let temperature: Extrema = window
            .readings
            .iter()
            .filter_map(|r| r.temperature)
            .collect();

        let low_voltage_count = window
            .arrivals
            .iter()
            .flat_map(|d| self.rules.classify(d))
            .filter(|e| e.kind == EventKind::LowVoltage)
            .count();

        let summary = BatterySummary {
            min_voltage: extrema.min().unwrap_or(0.0),
            max_voltage: extrema.max().unwrap_or(0.0),
            avg_voltage: mean.value().unwrap_or(0.0),
            voltage_drop: match (voltages.first(), voltages.last()) {
                (Some(first), Some(last)) => first - last,
                _ => 0.0,
            },
            low_voltage_count,
            avg_current: current.value(),
            max_temperature_c: temperature.max(),
        };

        let low = plausibility_signal(
            summary.min_voltage,
            self.thresholds.plausible_min_voltage,
            self.thresholds.plausible_max_voltage,
        );
        let high = plausibility_signal(
            summary.max_voltage,
            self.thresholds.plausible_min_voltage,
            self.thresholds.plausible_max_voltage,
        );
        let voltage_range = if low == Signal::Agree && high == Signal::Agree {
            Signal::Agree
        } else {
            Signal::Suspicious
        };

        Analysis {
            summary,
            signals: vec![voltage_range],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{arrival_deltas, compute_deltas};
    use crate::reading::Reading;
    use chrono::{TimeZone, Utc};

    fn reading(minute: i64, voltage: f64) -> Reading {
        let at = Utc.timestamp_opt(1_704_096_000 + minute * 60, 0).unwrap();
        Reading {
            voltage: Some(voltage),
            ..Reading::new("dev-1", at)
        }
    }

    fn summarize(readings: &[Reading]) -> Analysis<BatterySummary> {
        let deltas = compute_deltas(readings);
        let arrivals = arrival_deltas(readings);
        BatteryAnalyzer::new(BatteryThresholds::default())
            .summarize(&BucketWindow::new(readings, &deltas, &arrivals))
    }

    #[test]
    fn test_overnight_drain() {
        let readings = vec![
            reading(0, 12.6),
            reading(60, 12.2),
            reading(120, 11.6),
            reading(180, 11.5),
        ];
        let analysis = summarize(&readings);
        let summary = analysis.summary;

        assert_eq!(summary.min_voltage, 11.5);
        assert_eq!(summary.max_voltage, 12.6);
        assert!((summary.voltage_drop - 1.1).abs() < 1e-9);
        assert!((summary.avg_voltage - 11.975).abs() < 1e-9);
        assert_eq!(summary.low_voltage_count, 2);
        assert_eq!(summary.avg_current, None);
        assert_eq!(analysis.signals, vec![Signal::Agree]);
    }

    #[test]
    fn test_current_and_temperature_are_optional() {
        let mut readings = vec![reading(0, 13.8), reading(10, 13.9)];
        readings[0].current = Some(-4.0);
        readings[1].current = Some(-6.0);
        readings[1].temperature = Some(31.0);
        let summary = summarize(&readings).summary;

        assert_eq!(summary.avg_current, Some(-5.0));
        assert_eq!(summary.max_temperature_c, Some(31.0));
    }

    #[test]
    fn test_implausible_voltage_is_suspicious() {
        let analysis = summarize(&[reading(0, 12.4), reading(1, 48.0)]);
        assert_eq!(analysis.signals, vec![Signal::Suspicious]);
    }
}
