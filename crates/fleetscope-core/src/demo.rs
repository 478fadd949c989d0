//! Demo Mode - Simulated fleet telemetry for demos and tests
//!
//! Generates a plausible day-by-day reading stream for one vehicle without a
//! real telematics backend: trips with speed ramps, odometer growth, fuel
//! drain with gauge jitter and refuels, battery voltage, engine speed and
//! coolant temperature, a slowly leaking tire and the odd trouble code.
//! Seeded, so the same seed always produces the same readings.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::range::start_of_day;
use crate::reading::Reading;

const AMBIENT_TEMP_C: f64 = 20.0;
const OPERATING_TEMP_C: f64 = 90.0;
const NOMINAL_TIRE_KPA: f64 = 230.0;

/// Seeded vehicle simulator
pub struct FleetSimulator {
    device_id: String,
    /// Seconds between readings
    interval_seconds: i64,
    tank_capacity_liters: f64,
    /// Consumption while moving (L/100 km)
    liters_per_100km: f64,
    trip: TripState,
    /// Parked seconds left before the next trip
    parked_left: i64,
    speed: f64,
    cruise_speed: f64,
    odometer_m: f64,
    fuel_percent: f64,
    battery_v: f64,
    coolant_c: f64,
    dtc_count: u32,
    tires: [f64; 4],
    rng: StdRng,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TripState {
    /// Engine off
    Parked,
    /// Accelerating towards cruise speed
    RampUp,
    /// Driving, `left` seconds to go
    Cruise { left: i64 },
    /// Braking to a stop
    RampDown,
}

impl FleetSimulator {
    /// Create a simulator for one device
    pub fn new(device_id: impl Into<String>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let parked_left = rng.gen_range(20..90) * 60;
        let fuel_percent = rng.gen_range(55.0..95.0);

        Self {
            device_id: device_id.into(),
            interval_seconds: 60,
            tank_capacity_liters: 60.0,
            liters_per_100km: 9.0,
            trip: TripState::Parked,
            parked_left,
            speed: 0.0,
            cruise_speed: 0.0,
            odometer_m: rng.gen_range(20_000_000.0..120_000_000.0),
            fuel_percent,
            battery_v: 12.6,
            coolant_c: AMBIENT_TEMP_C,
            dtc_count: 0,
            tires: [NOMINAL_TIRE_KPA; 4],
            rng,
        }
    }

    /// Change the sampling interval (seconds, at least 1)
    pub fn with_interval_seconds(mut self, seconds: i64) -> Self {
        self.interval_seconds = seconds.max(1);
        self
    }

    /// Readings for one UTC day, continuing the vehicle's state
    pub fn generate_day(&mut self, date: NaiveDate) -> Vec<Reading> {
        let start = start_of_day(date);
        let interval = self.interval_seconds;
        (0..86_400 / interval)
            .map(|i| self.step(start + Duration::seconds(i * interval)))
            .collect()
    }

    /// Readings for every day from `first` through `last`
    pub fn generate_range(&mut self, first: NaiveDate, last: NaiveDate) -> Vec<Reading> {
        let mut readings = Vec::new();
        let mut date = first;
        while date <= last {
            readings.extend(self.generate_day(date));
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        readings
    }

    /// Advance by one interval and emit the reading at `at`
    fn step(&mut self, at: DateTime<Utc>) -> Reading {
        let dt = self.interval_seconds as f64;
        self.update_trip_state(at);

        let target = match self.trip {
            TripState::Parked | TripState::RampDown => 0.0,
            TripState::RampUp | TripState::Cruise { .. } => self.cruise_speed,
        };
        // ~1.5 km/h per second up, ~2.5 km/h per second down
        let rate = if target > self.speed { 1.5 } else { 2.5 };
        let max_change = rate * dt;
        self.speed += (target - self.speed).clamp(-max_change, max_change);
        let wobble = if matches!(self.trip, TripState::Cruise { .. }) {
            self.rng.gen_range(-4.0..4.0)
        } else {
            0.0
        };
        let speed = (self.speed + wobble).max(0.0);

        let distance_km = speed * dt / 3600.0;
        self.odometer_m += distance_km * 1000.0;

        let running = self.trip != TripState::Parked;
        self.update_fuel(distance_km, running, dt);
        self.update_thermal_and_electrical(running, dt);
        self.update_tires();

        if running && self.rng.gen_bool(0.0005) {
            self.dtc_count += 1;
        }

        let rpm = if running {
            750.0 + speed * 28.0 + self.rng.gen_range(-40.0..40.0)
        } else {
            0.0
        };
        let current = if running {
            self.rng.gen_range(4.0..15.0)
        } else {
            -0.4
        };
        // The gauge sender bounces a little on its own
        let fuel_reading = if self.rng.gen_bool(0.08) {
            (self.fuel_percent + self.rng.gen_range(-3.0..3.0)).clamp(0.0, 100.0)
        } else {
            self.fuel_percent
        };

        Reading {
            speed: Some(round1(speed)),
            odometer: Some(self.odometer_m.round()),
            fuel_level: Some(round1(fuel_reading)),
            rpm: Some(rpm.round()),
            ignition: Some(running),
            voltage: Some(round2(self.battery_v + self.rng.gen_range(-0.05..0.05))),
            current: Some(round1(current)),
            temperature: Some(round1(self.coolant_c)),
            dtc_count: Some(self.dtc_count),
            tire_pressures: Some(self.tires.iter().map(|p| round1(*p)).collect()),
            ..Reading::new(self.device_id.clone(), at)
        }
    }

    /// Advance the trip state machine
    fn update_trip_state(&mut self, at: DateTime<Utc>) {
        let dt = self.interval_seconds;

        match self.trip {
            TripState::Parked => {
                self.parked_left -= dt;
                let daytime = (6..22).contains(&at.hour());
                if self.parked_left <= 0 && daytime {
                    self.cruise_speed = if self.rng.gen_bool(0.1) {
                        self.rng.gen_range(105.0..125.0)
                    } else {
                        self.rng.gen_range(40.0..95.0)
                    };
                    self.trip = TripState::RampUp;
                }
            }
            TripState::RampUp => {
                if self.speed >= self.cruise_speed - 1.0 {
                    let left = self.rng.gen_range(10..80) * 60;
                    self.trip = TripState::Cruise { left };
                }
            }
            TripState::Cruise { left } => {
                if left <= dt {
                    self.trip = TripState::RampDown;
                } else {
                    self.trip = TripState::Cruise { left: left - dt };
                }
            }
            TripState::RampDown => {
                if self.speed <= 0.0 {
                    self.trip = TripState::Parked;
                    self.parked_left = self.rng.gen_range(30..300) * 60;
                }
            }
        }
    }

    fn update_fuel(&mut self, distance_km: f64, running: bool, dt: f64) {
        let mut liters = distance_km * self.liters_per_100km / 100.0;
        if running && distance_km == 0.0 {
            // idling burns ~0.8 L/h
            liters += 0.8 * dt / 3600.0;
        }
        self.fuel_percent -= liters / self.tank_capacity_liters * 100.0;

        if !running && self.fuel_percent < 20.0 {
            self.fuel_percent = self.rng.gen_range(85.0..100.0);
        }
        self.fuel_percent = self.fuel_percent.clamp(0.0, 100.0);
    }

    fn update_thermal_and_electrical(&mut self, running: bool, dt: f64) {
        let (target_temp, temp_tau) = if running {
            (OPERATING_TEMP_C, 600.0)
        } else {
            (AMBIENT_TEMP_C, 3600.0)
        };
        self.coolant_c += (target_temp - self.coolant_c) * (1.0 - (-dt / temp_tau).exp());

        if running {
            self.battery_v += (13.9 - self.battery_v) * 0.3;
        } else {
            // resting voltage minus a small parasitic drain
            self.battery_v += (12.6 - self.battery_v) * 0.05 - 0.00002 * dt;
            self.battery_v = self.battery_v.max(11.2);
        }
    }

    fn update_tires(&mut self) {
        // rear left leaks slowly until someone reinflates it
        self.tires[2] -= 0.002 * self.interval_seconds as f64;
        if self.tires[2] < 185.0 {
            self.tires[2] = NOMINAL_TIRE_KPA;
        }
        for tire in &mut self.tires {
            *tire += self.rng.gen_range(-0.3..0.3);
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
