//! Event classification
//!
//! Per-delta rules map one delta to zero or more events; several rules may
//! fire on the same delta. Refuel and consumption are day-level and work on
//! the filtered fuel samples of a single day instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{
    BatteryThresholds, DrivingThresholds, EngineThresholds, FuelSettings, TireThresholds,
};
use crate::delta::Delta;
use crate::filter::FuelSample;
use crate::unit_conversion::fuel_percent_to_liters;

/// Kinds of derived events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// Speed above the configured limit
    Speeding,
    /// Fast speed gain
    RapidAccel,
    /// Fast speed loss
    RapidDecel,
    /// Fuel added to the tank
    Refuel,
    /// Fuel used over a day
    Consumption,
    /// Engine speed above the limit
    OverRev,
    /// Coolant temperature above the limit
    OverTemperature,
    /// Battery voltage below the limit
    LowVoltage,
    /// New diagnostic trouble codes appeared
    FaultCode,
    /// A tire below the pressure limit
    LowTirePressure,
}

/// One derived event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// What happened
    pub kind: EventKind,
    /// When it happened
    pub occurs_at: DateTime<Utc>,
    /// Size of the event in the kind's own unit
    pub magnitude: f64,
}

impl Event {
    /// Create a new event
    pub fn new(kind: EventKind, occurs_at: DateTime<Utc>, magnitude: f64) -> Self {
        Self {
            kind,
            occurs_at,
            magnitude,
        }
    }
}

/// A rule that inspects one delta
pub trait DeltaRule: Send + Sync {
    /// Push any events this delta triggers
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>);
}

/// `to.speed > limit`; magnitude is the excess in km/h
#[derive(Debug, Clone, Copy)]
pub struct SpeedingRule {
    /// Speed limit (km/h)
    pub limit_kph: f64,
}

impl DeltaRule for SpeedingRule {
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>) {
        let speed = delta.to.speed_or_zero();
        if speed > self.limit_kph {
            events.push(Event::new(
                EventKind::Speeding,
                delta.to.timestamp,
                speed - self.limit_kph,
            ));
        }
    }
}

/// Speed gain above a threshold within a time window
#[derive(Debug, Clone, Copy)]
pub struct RapidAccelRule {
    /// Minimum gain (km/h)
    pub threshold_kph: f64,
    /// Longest gap (s)
    pub window_seconds: f64,
}

impl DeltaRule for RapidAccelRule {
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>) {
        if delta.speed_delta_kph > self.threshold_kph
            && delta.elapsed_seconds <= self.window_seconds
        {
            events.push(Event::new(
                EventKind::RapidAccel,
                delta.to.timestamp,
                delta.speed_delta_kph,
            ));
        }
    }
}

/// Speed loss above a threshold within a time window
#[derive(Debug, Clone, Copy)]
pub struct RapidDecelRule {
    /// Minimum loss (km/h)
    pub threshold_kph: f64,
    /// Longest gap (s)
    pub window_seconds: f64,
}

impl DeltaRule for RapidDecelRule {
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>) {
        if delta.speed_delta_kph < -self.threshold_kph
            && delta.elapsed_seconds <= self.window_seconds
        {
            events.push(Event::new(
                EventKind::RapidDecel,
                delta.to.timestamp,
                -delta.speed_delta_kph,
            ));
        }
    }
}

/// `to.rpm > max_rpm`
#[derive(Debug, Clone, Copy)]
pub struct OverRevRule {
    /// Engine speed limit
    pub max_rpm: f64,
}

impl DeltaRule for OverRevRule {
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>) {
        if let Some(rpm) = delta.to.rpm {
            if rpm > self.max_rpm {
                events.push(Event::new(
                    EventKind::OverRev,
                    delta.to.timestamp,
                    rpm - self.max_rpm,
                ));
            }
        }
    }
}

/// `to.temperature > max`
#[derive(Debug, Clone, Copy)]
pub struct OverTemperatureRule {
    /// Coolant limit (°C)
    pub max_temp_c: f64,
}

impl DeltaRule for OverTemperatureRule {
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>) {
        if let Some(temp) = delta.to.temperature {
            if temp > self.max_temp_c {
                events.push(Event::new(
                    EventKind::OverTemperature,
                    delta.to.timestamp,
                    temp - self.max_temp_c,
                ));
            }
        }
    }
}

/// Coarse fault matching: the trouble code count went up
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultCodeRule;

impl DeltaRule for FaultCodeRule {
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>) {
        if let (Some(before), Some(after)) = (delta.from.dtc_count, delta.to.dtc_count) {
            if after > before {
                events.push(Event::new(
                    EventKind::FaultCode,
                    delta.to.timestamp,
                    (after - before) as f64,
                ));
            }
        }
    }
}

/// `to.voltage < low_voltage`
#[derive(Debug, Clone, Copy)]
pub struct LowVoltageRule {
    /// Voltage limit (V)
    pub low_voltage: f64,
}

impl DeltaRule for LowVoltageRule {
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>) {
        if let Some(voltage) = delta.to.voltage {
            if voltage < self.low_voltage {
                events.push(Event::new(
                    EventKind::LowVoltage,
                    delta.to.timestamp,
                    self.low_voltage - voltage,
                ));
            }
        }
    }
}

/// Any tire of `to` below the pressure limit; magnitude is the worst shortfall
#[derive(Debug, Clone, Copy)]
pub struct LowTirePressureRule {
    /// Pressure limit (kPa)
    pub low_pressure_kpa: f64,
}

impl DeltaRule for LowTirePressureRule {
    fn apply(&self, delta: &Delta<'_>, events: &mut Vec<Event>) {
        let Some(pressures) = delta.to.tire_pressures.as_ref() else {
            return;
        };
        let lowest = pressures.iter().copied().fold(f64::INFINITY, f64::min);
        if lowest < self.low_pressure_kpa {
            events.push(Event::new(
                EventKind::LowTirePressure,
                delta.to.timestamp,
                self.low_pressure_kpa - lowest,
            ));
        }
    }
}

/// An ordered collection of delta rules
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn DeltaRule>>,
}

impl RuleSet {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule
    pub fn with(mut self, rule: impl DeltaRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Speeding, rapid acceleration and rapid deceleration
    pub fn driving(thresholds: &DrivingThresholds) -> Self {
        Self::new()
            .with(SpeedingRule {
                limit_kph: thresholds.speed_limit_kph,
            })
            .with(RapidAccelRule {
                threshold_kph: thresholds.accel_threshold_kph,
                window_seconds: thresholds.accel_window_seconds,
            })
            .with(RapidDecelRule {
                threshold_kph: thresholds.decel_threshold_kph,
                window_seconds: thresholds.decel_window_seconds,
            })
    }

    /// Over-rev, over-temperature and new fault codes
    pub fn engine(thresholds: &EngineThresholds) -> Self {
        Self::new()
            .with(OverRevRule {
                max_rpm: thresholds.max_rpm,
            })
            .with(OverTemperatureRule {
                max_temp_c: thresholds.max_coolant_temp_c,
            })
            .with(FaultCodeRule)
    }

    /// Low battery voltage
    pub fn battery(thresholds: &BatteryThresholds) -> Self {
        Self::new().with(LowVoltageRule {
            low_voltage: thresholds.low_voltage,
        })
    }

    /// Low tire pressure
    pub fn tire(thresholds: &TireThresholds) -> Self {
        Self::new().with(LowTirePressureRule {
            low_pressure_kpa: thresholds.low_pressure_kpa,
        })
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All events triggered by one delta
    pub fn classify(&self, delta: &Delta<'_>) -> Vec<Event> {
        let mut events = Vec::new();
        for rule in &self.rules {
            rule.apply(delta, &mut events);
        }
        events
    }
}

/// Count events by kind
pub fn count_by_kind(events: &[Event]) -> HashMap<EventKind, usize> {
    let mut counts = HashMap::new();
    for event in events {
        *counts.entry(event.kind).or_insert(0) += 1;
    }
    counts
}

/// Refuels among one day's filtered fuel samples.
///
/// An increase of at least `refuel_min_increase` between consecutive samples
/// is a refuel when the samples are at least `refuel_min_window_minutes`
/// apart, or when the increase reaches `refuel_large_jump` (large jumps count
/// regardless of timing).
pub fn detect_refuels(samples: &[FuelSample], settings: &FuelSettings) -> Vec<Event> {
    samples
        .windows(2)
        .filter_map(|pair| {
            let increase = pair[1].level - pair[0].level;
            if increase < settings.refuel_min_increase {
                return None;
            }
            let elapsed_minutes = (pair[1].at - pair[0].at).num_seconds() as f64 / 60.0;
            let long_enough = elapsed_minutes >= settings.refuel_min_window_minutes;
            let large_jump = increase >= settings.refuel_large_jump;

            (long_enough || large_jump).then(|| Event::new(EventKind::Refuel, pair[1].at, increase))
        })
        .collect()
}

/// Fuel accounting for one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyFuel {
    /// Refuels detected this day
    pub refuel_count: usize,
    /// Sum of refuel amounts (percent points)
    pub refueled_percent: f64,
    /// Fuel used (percent points)
    pub consumed_percent: f64,
    /// Fuel used (liters)
    pub consumed_liters: f64,
}

/// Consumption for one day from its filtered samples and refuels.
///
/// With refuels: `max(0, refueled - (last - first))`. Without:
/// `max(0, first - last)`. The returned event carries liters.
pub fn daily_consumption(
    samples: &[FuelSample],
    refuels: &[Event],
    settings: &FuelSettings,
) -> (DailyFuel, Option<Event>) {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return (DailyFuel::default(), None);
    };

    let net_change = last.level - first.level;
    let refueled_percent: f64 = refuels.iter().map(|e| e.magnitude).sum();

    let consumed_percent = if refuels.is_empty() {
        (first.level - last.level).max(0.0)
    } else {
        (refueled_percent - net_change).max(0.0)
    };
    let consumed_liters = fuel_percent_to_liters(consumed_percent, settings.tank_capacity_liters);

    let daily = DailyFuel {
        refuel_count: refuels.len(),
        refueled_percent,
        consumed_percent,
        consumed_liters,
    };
    let event = Event::new(EventKind::Consumption, last.at, consumed_liters);
    (daily, Some(event))
}
