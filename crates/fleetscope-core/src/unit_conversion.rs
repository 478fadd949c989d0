//! Unit Conversion Functions
//!
//! Conversions used when turning raw telemetry into report figures:
//! - Distance: meters (odometer) → kilometers
//! - Fuel: gauge percent → liters for a given tank
//! - Time: milliseconds → seconds, seconds → hours

/// Convert meters to kilometers
pub fn meters_to_km(meters: f64) -> f64 {
    meters / 1000.0
}

/// Convert a fuel gauge change (0-100 percent points) to liters
///
/// # Arguments
/// * `percent` - Fuel level change in percent points
/// * `tank_capacity_liters` - Usable tank volume
pub fn fuel_percent_to_liters(percent: f64, tank_capacity_liters: f64) -> f64 {
    percent * tank_capacity_liters / 100.0
}

/// Convert milliseconds to seconds
pub fn millis_to_seconds(millis: i64) -> f64 {
    millis as f64 / 1000.0
}

/// Convert seconds to hours
pub fn seconds_to_hours(seconds: f64) -> f64 {
    seconds / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuel_percent_to_liters() {
        assert_eq!(fuel_percent_to_liters(50.0, 60.0), 30.0);
        assert_eq!(fuel_percent_to_liters(0.0, 60.0), 0.0);
    }

    #[test]
    fn test_meters_to_km() {
        assert_eq!(meters_to_km(120_000.0), 120.0);
    }

    #[test]
    fn test_time_conversions() {
        assert_eq!(millis_to_seconds(2500), 2.5);
        assert_eq!(seconds_to_hours(5400.0), 1.5);
    }
}
