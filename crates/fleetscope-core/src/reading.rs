//! Telemetry readings
//!
//! A reading is one timestamped bag of sensor values reported by a device.
//! Every sensor is optional: hardware differs per vehicle and samples drop
//! fields at random.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One timestamped telemetry sample from a device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Reporting device
    pub device_id: String,
    /// Sample time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Ground speed in km/h
    pub speed: Option<f64>,
    /// Odometer in meters
    pub odometer: Option<f64>,
    /// Fuel gauge, 0-100 percent
    pub fuel_level: Option<f64>,
    /// Engine speed
    pub rpm: Option<f64>,
    /// Ignition switch state
    pub ignition: Option<bool>,
    /// Battery voltage (V)
    pub voltage: Option<f64>,
    /// Battery current (A, negative while discharging)
    pub current: Option<f64>,
    /// Coolant temperature (°C)
    pub temperature: Option<f64>,
    /// Number of active diagnostic trouble codes
    pub dtc_count: Option<u32>,
    /// Tire pressures in kPa, one entry per tire
    pub tire_pressures: Option<Vec<f64>>,
}

impl Reading {
    /// Create a reading with no sensor values
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            ..Self::default()
        }
    }

    /// Speed with missing treated as stationary
    pub fn speed_or_zero(&self) -> f64 {
        self.speed.unwrap_or(0.0)
    }

    /// `true` when the vehicle is moving (speed > 0)
    pub fn is_moving(&self) -> bool {
        self.speed_or_zero() > 0.0
    }

    /// `true` when the engine is running, judged by ignition or rpm
    pub fn is_engine_running(&self) -> bool {
        match self.ignition {
            Some(on) => on,
            None => self.rpm.unwrap_or(0.0) > 0.0,
        }
    }

    /// Mean pressure across all reported tires
    pub fn mean_tire_pressure(&self) -> Option<f64> {
        let pressures = self.tire_pressures.as_ref()?;
        if pressures.is_empty() {
            return None;
        }
        Some(pressures.iter().sum::<f64>() / pressures.len() as f64)
    }

    /// Check whether a field carries a value
    pub fn has(&self, field: ReadingField) -> bool {
        match field {
            ReadingField::Speed => self.speed.is_some(),
            ReadingField::Odometer => self.odometer.is_some(),
            ReadingField::FuelLevel => self.fuel_level.is_some(),
            ReadingField::Rpm => self.rpm.is_some(),
            ReadingField::Ignition => self.ignition.is_some(),
            ReadingField::Voltage => self.voltage.is_some(),
            ReadingField::Current => self.current.is_some(),
            ReadingField::Temperature => self.temperature.is_some(),
            ReadingField::DtcCount => self.dtc_count.is_some(),
            ReadingField::TirePressures => self
                .tire_pressures
                .as_ref()
                .is_some_and(|p| !p.is_empty()),
        }
    }

    /// Check whether the reading carries any of the given fields.
    /// An empty field list matches every reading.
    pub fn has_any(&self, fields: &[ReadingField]) -> bool {
        fields.is_empty() || fields.iter().any(|f| self.has(*f))
    }

    /// A reading is well formed when every required field is present and no
    /// present numeric value is NaN or infinite.
    pub fn is_well_formed(&self, required: &[ReadingField]) -> bool {
        if !required.iter().all(|f| self.has(*f)) {
            return false;
        }

        let scalars = [
            self.speed,
            self.odometer,
            self.fuel_level,
            self.rpm,
            self.voltage,
            self.current,
            self.temperature,
        ];
        if scalars.iter().flatten().any(|v| !v.is_finite()) {
            return false;
        }

        match &self.tire_pressures {
            Some(p) => p.iter().all(|v| v.is_finite()),
            None => true,
        }
    }
}

/// Optional reading fields, used to describe what a domain needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadingField {
    /// Ground speed
    Speed,
    /// Odometer
    Odometer,
    /// Fuel gauge
    FuelLevel,
    /// Engine speed
    Rpm,
    /// Ignition state
    Ignition,
    /// Battery voltage
    Voltage,
    /// Battery current
    Current,
    /// Coolant temperature
    Temperature,
    /// Trouble code count
    DtcCount,
    /// Tire pressures
    TirePressures,
}

impl fmt::Display for ReadingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadingField::Speed => "speed",
            ReadingField::Odometer => "odometer",
            ReadingField::FuelLevel => "fuelLevel",
            ReadingField::Rpm => "rpm",
            ReadingField::Ignition => "ignition",
            ReadingField::Voltage => "voltage",
            ReadingField::Current => "current",
            ReadingField::Temperature => "temperature",
            ReadingField::DtcCount => "dtcCount",
            ReadingField::TirePressures => "tirePressures",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let reading = Reading {
            fuel_level: Some(50.0),
            ..Reading::new("dev-1", at(0))
        };

        assert!(reading.is_well_formed(&[ReadingField::FuelLevel]));
        assert!(!reading.is_well_formed(&[ReadingField::FuelLevel, ReadingField::Speed]));
    }

    #[test]
    fn test_non_finite_value_is_malformed() {
        let reading = Reading {
            speed: Some(f64::NAN),
            fuel_level: Some(50.0),
            ..Reading::new("dev-1", at(0))
        };

        assert!(!reading.is_well_formed(&[ReadingField::FuelLevel]));
    }

    #[test]
    fn test_empty_tire_vector_counts_as_absent() {
        let reading = Reading {
            tire_pressures: Some(Vec::new()),
            ..Reading::new("dev-1", at(0))
        };

        assert!(!reading.has(ReadingField::TirePressures));
        assert_eq!(reading.mean_tire_pressure(), None);
    }

    #[test]
    fn test_engine_running_falls_back_to_rpm() {
        let idle = Reading {
            rpm: Some(800.0),
            ..Reading::new("dev-1", at(0))
        };
        let keyed_off = Reading {
            ignition: Some(false),
            rpm: Some(800.0),
            ..Reading::new("dev-1", at(0))
        };

        assert!(idle.is_engine_running());
        assert!(!keyed_off.is_engine_running());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "deviceId": "truck-7",
            "timestamp": "2024-01-01T08:00:00Z",
            "speed": 42.5,
            "fuelLevel": 71.0,
            "dtcCount": 2,
            "tirePressures": [220.0, 221.0, 219.5, 220.0]
        }"#;

        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.device_id, "truck-7");
        assert_eq!(reading.speed, Some(42.5));
        assert_eq!(reading.fuel_level, Some(71.0));
        assert_eq!(reading.dtc_count, Some(2));
        assert_eq!(reading.odometer, None);
        assert!(reading.has(ReadingField::TirePressures));
    }
}
