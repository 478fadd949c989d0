//! Analytics domains
//!
//! Each domain (driving, fuel, battery, engine, tire) is a strategy plugged
//! into the one generic aggregator: it names the fields it needs and reduces
//! a bucket's readings and deltas into its own summary.

mod battery;
mod driving;
mod engine;
mod fuel;
mod tire;

pub use battery::{BatteryAnalyzer, BatterySummary};
pub use driving::{DrivingAnalyzer, DrivingSummary};
pub use engine::{EngineAnalyzer, EngineSummary};
pub use fuel::{FuelAnalyzer, FuelSummary};
pub use tire::{TireAnalyzer, TireSummary};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::confidence::Signal;
use crate::delta::Delta;
use crate::reading::{Reading, ReadingField};

/// One analytics category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Driving behavior
    Driving,
    /// Fuel consumption and refueling
    Fuel,
    /// Battery health
    Battery,
    /// Engine health
    Engine,
    /// Tire pressure
    Tire,
}

impl Domain {
    /// Every domain, in report column order
    pub const ALL: [Domain; 5] = [
        Domain::Driving,
        Domain::Fuel,
        Domain::Battery,
        Domain::Engine,
        Domain::Tire,
    ];

    /// Parse from a request parameter
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "driving" => Some(Domain::Driving),
            "fuel" => Some(Domain::Fuel),
            "battery" => Some(Domain::Battery),
            "engine" => Some(Domain::Engine),
            "tire" | "tires" => Some(Domain::Tire),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Driving => "driving",
            Domain::Fuel => "fuel",
            Domain::Battery => "battery",
            Domain::Engine => "engine",
            Domain::Tire => "tire",
        };
        f.write_str(name)
    }
}

/// The readings and deltas that fall into one bucket.
///
/// `readings` is a contiguous, time-ordered slice of the device's series.
/// `deltas` are those whose FROM reading lies in the bucket, so a delta that
/// crosses a bucket boundary adds its distance and time exactly once.
/// `arrivals` are those whose TO reading lies in the bucket, one per reading;
/// events are classified on them so an event lands in the bucket of the
/// reading that raised it.
#[derive(Debug, Clone, Copy)]
pub struct BucketWindow<'a> {
    /// Readings in the bucket
    pub readings: &'a [Reading],
    /// Deltas starting in the bucket
    pub deltas: &'a [Delta<'a>],
    /// Deltas ending in the bucket
    pub arrivals: &'a [Delta<'a>],
}

impl<'a> BucketWindow<'a> {
    /// Create a window
    pub fn new(
        readings: &'a [Reading],
        deltas: &'a [Delta<'a>],
        arrivals: &'a [Delta<'a>],
    ) -> Self {
        Self {
            readings,
            deltas,
            arrivals,
        }
    }

    /// Sum of delta distances
    pub fn distance_km(&self) -> f64 {
        self.deltas.iter().map(|d| d.distance_delta_km).sum()
    }
}

/// A domain summary with the consistency checks behind its confidence
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis<S> {
    /// Reduced figures for the bucket
    pub summary: S,
    /// Domain consistency checks fed to the confidence scorer
    pub signals: Vec<Signal>,
}

/// A per-domain strategy for the generic aggregator
pub trait DomainAnalyzer: Send + Sync {
    /// Per-bucket figures; `Default` is the zeroed summary of an empty bucket
    type Summary: Clone + Default + fmt::Debug + PartialEq + Serialize + Send;

    /// Which domain this analyzer serves
    fn domain(&self) -> Domain;

    /// Readings carrying any of these fields are fetched from the source
    fn relevant_fields(&self) -> &'static [ReadingField];

    /// Readings missing any of these fields are skipped and counted
    fn required_fields(&self) -> &'static [ReadingField];

    /// Reduce one non-empty bucket
    fn summarize(&self, window: &BucketWindow<'_>) -> Analysis<Self::Summary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_names_round_trip() {
        for domain in Domain::ALL {
            assert_eq!(Domain::from_name(&domain.to_string()), Some(domain));
        }
        assert_eq!(Domain::from_name("Tires"), Some(Domain::Tire));
        assert_eq!(Domain::from_name("gps"), None);
    }
}
