//! Engine health: running time, engine speed, coolant and trouble codes

use serde::Serialize;

use super::{Analysis, BucketWindow, Domain, DomainAnalyzer};
use crate::aggregate::{Extrema, WeightedMean};
use crate::config::{AnalyticsConfig, EngineThresholds};
use crate::confidence::Signal;
use crate::events::{EventKind, RuleSet};
use crate::reading::ReadingField;

/// Engine figures for one bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSummary {
    /// Time with the engine running (s)
    pub running_time_seconds: f64,
    /// Highest engine speed
    pub max_rpm: f64,
    /// Time-weighted engine speed while running
    pub avg_running_rpm: f64,
    /// Highest coolant temperature, when reported (°C)
    pub max_coolant_temp_c: Option<f64>,
    /// Over-rev events
    pub over_rev_count: usize,
    /// Over-temperature events
    pub over_temperature_count: usize,
    /// Times the trouble code count went up
    pub fault_events: usize,
    /// Trouble codes that appeared
    pub new_fault_codes: u32,
    /// Trouble code count of the last reading that reported one
    pub latest_dtc_count: Option<u32>,
}

/// Engine domain strategy
pub struct EngineAnalyzer {
    thresholds: EngineThresholds,
    rules: RuleSet,
}

impl EngineAnalyzer {
    /// Create an analyzer with the given thresholds
    pub fn new(thresholds: EngineThresholds) -> Self {
        let rules = RuleSet::engine(&thresholds);
        Self { thresholds, rules }
    }

    /// Create an analyzer from the engine section of the config
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.engine.clone())
    }
}

impl DomainAnalyzer for EngineAnalyzer {
    type Summary = EngineSummary;

    fn domain(&self) -> Domain {
        Domain::Engine
    }

    fn relevant_fields(&self) -> &'static [ReadingField] {
        &[
            ReadingField::Rpm,
            ReadingField::Temperature,
            ReadingField::DtcCount,
        ]
    }

    fn required_fields(&self) -> &'static [ReadingField] {
        &[ReadingField::Rpm]
    }

    fn summarize(&self, window: &BucketWindow<'_>) -> Analysis<EngineSummary> {
        let mut summary = EngineSummary::default();
        let mut running_rpm = WeightedMean::default();

        for delta in window.deltas {
            if delta.spans_gap(self.thresholds.max_gap_seconds) {
                continue;
            }
            if delta.from.is_engine_running() && delta.elapsed_seconds > 0.0 {
                summary.running_time_seconds += delta.elapsed_seconds;
                running_rpm.push(delta.from.rpm.unwrap_or(0.0), delta.elapsed_seconds);
            }
        }

        for delta in window.arrivals {
            for event in self.rules.classify(delta) {
                match event.kind {
                    EventKind::OverRev => summary.over_rev_count += 1,
                    EventKind::OverTemperature => summary.over_temperature_count += 1,
                    EventKind::FaultCode => {
                        summary.fault_events += 1;
                        summary.new_fault_codes += event.magnitude as u32;
                    }
                    _ => {}
                }
            }
        }

        let rpm: Extrema = window.readings.iter().filter_map(|r| r.rpm).collect();
        let coolant: Extrema = window
            .readings
            .iter()
            .filter_map(|r| r.temperature)
            .collect();

        summary.max_rpm = rpm.max().unwrap_or(0.0);
        summary.avg_running_rpm = running_rpm.value().unwrap_or(0.0);
        summary.max_coolant_temp_c = coolant.max();
        summary.latest_dtc_count = window.readings.iter().rev().find_map(|r| r.dtc_count);

        // Engine speed with the ignition reported off means one sensor lies
        let contradicts = window
            .readings
            .iter()
            .any(|r| r.ignition == Some(false) && r.rpm.is_some_and(|rpm| rpm > 0.0));
        let ignition_signal = if contradicts {
            Signal::Suspicious
        } else {
            Signal::Agree
        };

        Analysis {
            summary,
            signals: vec![ignition_signal],
        }
    }
}
