//! Analytics configuration
//!
//! Every threshold used by the event rules, the noise filter and the
//! confidence scorer lives here. Values are fleet and vehicle dependent, so
//! nothing is hardcoded in the engine. Stored as JSON; missing fields fall
//! back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::bucket::Granularity;

/// Errors that can occur while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read or written
    #[error("I/O error reading config: {0}")]
    IoError(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema
    #[error("Invalid config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A threshold is zero, negative or NaN
    #[error("'{field}' must be positive, got {value}")]
    NonPositive {
        /// JSON path of the offending field
        field: &'static str,
        /// Value found
        value: f64,
    },

    /// A value exceeds its upper bound
    #[error("'{field}' must be at most {max}, got {value}")]
    TooLarge {
        /// JSON path of the offending field
        field: &'static str,
        /// Value found
        value: f64,
        /// Largest accepted value
        max: f64,
    },

    /// Two related thresholds are in the wrong order
    #[error("'{field}' must not be below '{other}'")]
    OutOfOrder {
        /// JSON path of the field that is too small
        field: &'static str,
        /// JSON path of the field it is compared with
        other: &'static str,
    },
}

/// Longest status lookback accepted, ten years in hours
pub const MAX_STATUS_LOOKBACK_HOURS: f64 = 24.0 * 366.0 * 10.0;

/// Driving behavior thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DrivingThresholds {
    /// Speeds above this are speeding (km/h)
    pub speed_limit_kph: f64,
    /// Speed gain that counts as rapid acceleration (km/h)
    pub accel_threshold_kph: f64,
    /// Longest gap over which a rapid acceleration is recognized (s)
    pub accel_window_seconds: f64,
    /// Speed loss that counts as rapid deceleration (km/h)
    pub decel_threshold_kph: f64,
    /// Longest gap over which a rapid deceleration is recognized (s)
    pub decel_window_seconds: f64,
    /// Highest believable speed, used by the confidence check (km/h)
    pub plausible_max_speed_kph: f64,
    /// Readings further apart than this add no driving or idle time (s)
    pub max_gap_seconds: f64,
}

impl Default for DrivingThresholds {
    fn default() -> Self {
        Self {
            speed_limit_kph: 100.0,
            accel_threshold_kph: 12.0,
            accel_window_seconds: 3.0,
            decel_threshold_kph: 15.0,
            decel_window_seconds: 3.0,
            plausible_max_speed_kph: 250.0,
            max_gap_seconds: 3600.0,
        }
    }
}

/// Fuel tank and refuel detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FuelSettings {
    /// Usable tank volume (liters)
    pub tank_capacity_liters: f64,
    /// Smallest gauge increase treated as a refuel (percent points)
    pub refuel_min_increase: f64,
    /// Minimum gap between samples for a normal-sized refuel (minutes)
    pub refuel_min_window_minutes: f64,
    /// Increases this large are refuels regardless of the gap (percent points)
    pub refuel_large_jump: f64,
    /// Jumps below this are candidates for jitter removal (percent points)
    pub jitter_threshold: f64,
}

impl Default for FuelSettings {
    fn default() -> Self {
        Self {
            tank_capacity_liters: 60.0,
            refuel_min_increase: 15.0,
            refuel_min_window_minutes: 30.0,
            refuel_large_jump: 30.0,
            jitter_threshold: 5.0,
        }
    }
}

/// Battery health thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatteryThresholds {
    /// Voltages below this raise a low voltage event (V)
    pub low_voltage: f64,
    /// Lowest believable voltage (V)
    pub plausible_min_voltage: f64,
    /// Highest believable voltage (V)
    pub plausible_max_voltage: f64,
}

impl Default for BatteryThresholds {
    fn default() -> Self {
        Self {
            low_voltage: 11.8,
            plausible_min_voltage: 6.0,
            plausible_max_voltage: 32.0,
        }
    }
}

/// Engine health thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineThresholds {
    /// Engine speeds above this are over-revs
    pub max_rpm: f64,
    /// Coolant temperatures above this are over-temperature (°C)
    pub max_coolant_temp_c: f64,
    /// Readings further apart than this add no running time (s)
    pub max_gap_seconds: f64,
}

impl Default for EngineThresholds {
    fn default() -> Self {
        Self {
            max_rpm: 6500.0,
            max_coolant_temp_c: 110.0,
            max_gap_seconds: 3600.0,
        }
    }
}

/// Tire pressure thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TireThresholds {
    /// Any tire below this raises a low pressure event (kPa)
    pub low_pressure_kpa: f64,
    /// Highest believable pressure (kPa)
    pub plausible_max_pressure_kpa: f64,
}

impl Default for TireThresholds {
    fn default() -> Self {
        Self {
            low_pressure_kpa: 200.0,
            plausible_max_pressure_kpa: 900.0,
        }
    }
}

/// Confidence scorer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfidenceSettings {
    /// Reading count for the top density score
    pub dense_reading_count: usize,
    /// Reading count for the middle density score
    pub min_reading_count: usize,
    /// Consumption while parked above this is suspicious (liters)
    pub idle_consumption_liters: f64,
    /// More refuels than this in one day is implausible
    pub max_daily_refuels: usize,
}

impl Default for ConfidenceSettings {
    fn default() -> Self {
        Self {
            dense_reading_count: 24,
            min_reading_count: 3,
            idle_consumption_liters: 2.0,
            max_daily_refuels: 3,
        }
    }
}

/// Complete analytics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsConfig {
    /// Default bucket size when a request does not choose one
    pub granularity: Granularity,
    /// Upper bound on buckets per request
    pub max_buckets: usize,
    /// How far back a status snapshot looks for a reading (hours)
    pub status_lookback_hours: f64,
    /// Driving thresholds
    pub driving: DrivingThresholds,
    /// Fuel settings
    pub fuel: FuelSettings,
    /// Battery thresholds
    pub battery: BatteryThresholds,
    /// Engine thresholds
    pub engine: EngineThresholds,
    /// Tire thresholds
    pub tire: TireThresholds,
    /// Confidence scorer settings
    pub confidence: ConfidenceSettings,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Day,
            max_buckets: 1000,
            status_lookback_hours: 24.0,
            driving: DrivingThresholds::default(),
            fuel: FuelSettings::default(),
            battery: BatteryThresholds::default(),
            engine: EngineThresholds::default(),
            tire: TireThresholds::default(),
            confidence: ConfidenceSettings::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Parse configuration from a JSON string and validate it
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: AnalyticsConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject non-positive thresholds and inconsistent orderings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.driving;
        let f = &self.fuel;
        let b = &self.battery;
        let e = &self.engine;
        let t = &self.tire;
        let c = &self.confidence;

        let checks: [(&'static str, f64); 23] = [
            ("maxBuckets", self.max_buckets as f64),
            ("statusLookbackHours", self.status_lookback_hours),
            ("driving.speedLimitKph", d.speed_limit_kph),
            ("driving.accelThresholdKph", d.accel_threshold_kph),
            ("driving.accelWindowSeconds", d.accel_window_seconds),
            ("driving.decelThresholdKph", d.decel_threshold_kph),
            ("driving.decelWindowSeconds", d.decel_window_seconds),
            ("driving.plausibleMaxSpeedKph", d.plausible_max_speed_kph),
            ("driving.maxGapSeconds", d.max_gap_seconds),
            ("fuel.tankCapacityLiters", f.tank_capacity_liters),
            ("fuel.refuelMinIncrease", f.refuel_min_increase),
            ("fuel.refuelMinWindowMinutes", f.refuel_min_window_minutes),
            ("fuel.refuelLargeJump", f.refuel_large_jump),
            ("fuel.jitterThreshold", f.jitter_threshold),
            ("battery.lowVoltage", b.low_voltage),
            ("battery.plausibleMaxVoltage", b.plausible_max_voltage),
            ("engine.maxRpm", e.max_rpm),
            ("engine.maxCoolantTempC", e.max_coolant_temp_c),
            ("engine.maxGapSeconds", e.max_gap_seconds),
            ("tire.lowPressureKpa", t.low_pressure_kpa),
            ("tire.plausibleMaxPressureKpa", t.plausible_max_pressure_kpa),
            ("confidence.denseReadingCount", c.dense_reading_count as f64),
            ("confidence.minReadingCount", c.min_reading_count as f64),
        ];

        for (field, value) in checks {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        if self.status_lookback_hours > MAX_STATUS_LOOKBACK_HOURS {
            return Err(ConfigError::TooLarge {
                field: "statusLookbackHours",
                value: self.status_lookback_hours,
                max: MAX_STATUS_LOOKBACK_HOURS,
            });
        }

        if c.dense_reading_count < c.min_reading_count {
            return Err(ConfigError::OutOfOrder {
                field: "confidence.denseReadingCount",
                other: "confidence.minReadingCount",
            });
        }
        if f.refuel_large_jump < f.refuel_min_increase {
            return Err(ConfigError::OutOfOrder {
                field: "fuel.refuelLargeJump",
                other: "fuel.refuelMinIncrease",
            });
        }
        if b.plausible_max_voltage < b.plausible_min_voltage {
            return Err(ConfigError::OutOfOrder {
                field: "battery.plausibleMaxVoltage",
                other: "battery.plausibleMinVoltage",
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AnalyticsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            AnalyticsConfig::from_json(r#"{ "driving": { "speedLimitKph": 80 }, "granularity": "week" }"#)
                .unwrap();

        assert_eq!(config.driving.speed_limit_kph, 80.0);
        assert_eq!(config.driving.accel_window_seconds, 3.0);
        assert_eq!(config.granularity, Granularity::Week);
        assert_eq!(config.fuel, FuelSettings::default());
    }

    #[test]
    fn test_non_positive_threshold_is_rejected() {
        let mut config = AnalyticsConfig::default();
        config.driving.accel_threshold_kph = 0.0;

        match config.validate() {
            Err(ConfigError::NonPositive { field, .. }) => {
                assert_eq!(field, "driving.accelThresholdKph")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_nan_threshold_is_rejected() {
        let mut config = AnalyticsConfig::default();
        config.fuel.tank_capacity_liters = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_status_lookback_is_rejected() {
        let config = AnalyticsConfig {
            status_lookback_hours: 1e10,
            ..AnalyticsConfig::default()
        };

        match config.validate() {
            Err(ConfigError::TooLarge { field, max, .. }) => {
                assert_eq!(field, "statusLookbackHours");
                assert_eq!(max, MAX_STATUS_LOOKBACK_HOURS);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let config = AnalyticsConfig {
            status_lookback_hours: MAX_STATUS_LOOKBACK_HOURS,
            ..AnalyticsConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_confidence_counts_are_rejected() {
        let mut config = AnalyticsConfig::default();
        config.confidence.dense_reading_count = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analytics.json");

        let mut config = AnalyticsConfig::default();
        config.fuel.tank_capacity_liters = 80.0;
        config.save(&path).unwrap();

        let loaded = AnalyticsConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
