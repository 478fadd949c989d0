//! Tire pressure trends

use serde::Serialize;

use super::{Analysis, BucketWindow, Domain, DomainAnalyzer};
use crate::aggregate::{Extrema, WeightedMean};
use crate::config::{AnalyticsConfig, TireThresholds};
use crate::confidence::{plausibility_signal, Signal};
use crate::events::{EventKind, RuleSet};
use crate::reading::ReadingField;

/// Tire figures for one bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TireSummary {
    /// Lowest pressure of any tire (kPa)
    pub min_pressure_kpa: f64,
    /// Highest pressure of any tire (kPa)
    pub max_pressure_kpa: f64,
    /// Mean of the per-reading mean pressures (kPa)
    pub avg_pressure_kpa: f64,
    /// Last mean pressure minus first; negative while leaking (kPa)
    pub pressure_trend_kpa: f64,
    /// Largest spread between tires within one reading (kPa)
    pub max_imbalance_kpa: f64,
    /// Low pressure events
    pub low_pressure_count: usize,
}

/// Tire domain strategy
pub struct TireAnalyzer {
    thresholds: TireThresholds,
    rules: RuleSet,
}

impl TireAnalyzer {
    /// Create an analyzer with the given thresholds
    pub fn new(thresholds: TireThresholds) -> Self {
        let rules = RuleSet::tire(&thresholds);
        Self { thresholds, rules }
    }

    /// Create an analyzer from the tire section of the config
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.tire.clone())
    }
}

impl DomainAnalyzer for TireAnalyzer {
    type Summary = TireSummary;

    fn domain(&self) -> Domain {
        Domain::Tire
    }

    fn relevant_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::TirePressures]
    }

    fn required_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::TirePressures]
    }

    fn summarize(&self, window: &BucketWindow<'_>) -> Analysis<TireSummary> {
        let mut all = Extrema::default();
        let mut imbalance = Extrema::default();
        let mut means = Vec::with_capacity(window.readings.len());

        for reading in window.readings {
            let Some(pressures) = reading.tire_pressures.as_deref() else {
                continue;
            };
            let this: Extrema = pressures.iter().copied().collect();
            if let (Some(min), Some(max)) = (this.min(), this.max()) {
                all.push(min);
                all.push(max);
                imbalance.push(max - min);
            }
            if let Some(mean) = reading.mean_tire_pressure() {
                means.push(mean);
            }
        }

        let avg: WeightedMean = means.iter().copied().collect();
        let low_pressure_count = window
            .arrivals
            .iter()
            .flat_map(|d| self.rules.classify(d))
            .filter(|e| e.kind == EventKind::LowTirePressure)
            .count();

        let summary = TireSummary {
            min_pressure_kpa: all.min().unwrap_or(0.0),
            max_pressure_kpa: all.max().unwrap_or(0.0),
            avg_pressure_kpa: avg.value().unwrap_or(0.0),
            pressure_trend_kpa: match (means.first(), means.last()) {
                (Some(first), Some(last)) => last - first,
                _ => 0.0,
            },
            max_imbalance_kpa: imbalance.max().unwrap_or(0.0),
            low_pressure_count,
        };

        let plausible = |value| {
            plausibility_signal(value, 0.0, self.thresholds.plausible_max_pressure_kpa)
        };
        let signal = if plausible(summary.min_pressure_kpa) == Signal::Agree
            && plausible(summary.max_pressure_kpa) == Signal::Agree
        {
            Signal::Agree
        } else {
            Signal::Suspicious
        };

        Analysis {
            summary,
            signals: vec![signal],
        }
    }
}
