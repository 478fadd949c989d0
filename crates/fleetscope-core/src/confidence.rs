//! Confidence scoring
//!
//! A best-effort data-quality heuristic, not a correctness proof. It rewards
//! dense data and signals that agree with each other, and penalizes patterns
//! that usually mean a faulty sensor or a gap in the upload. A `High` bucket
//! can still be wrong; a `Low` bucket is merely less trustworthy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfidenceSettings;

/// Quality label attached to every bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Sparse or contradictory data
    #[default]
    Low,
    /// Usable data with some doubt
    Medium,
    /// Dense, self-consistent data
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// Outcome of one cross-signal consistency check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Signals agree (+1)
    Agree,
    /// Signals contradict each other (-1)
    Suspicious,
    /// Nothing to say (0)
    Neutral,
}

impl Signal {
    fn points(self) -> i32 {
        match self {
            Signal::Agree => 1,
            Signal::Suspicious => -1,
            Signal::Neutral => 0,
        }
    }
}

/// Everything the scorer looks at for one bucket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityInputs {
    /// Usable readings in the bucket
    pub reading_count: usize,
    /// Malformed readings dropped from the bucket
    pub skipped: usize,
    /// Domain consistency checks
    pub signals: Vec<Signal>,
}

impl QualityInputs {
    /// Inputs with the given counts and no checks yet
    pub fn new(reading_count: usize, skipped: usize) -> Self {
        Self {
            reading_count,
            skipped,
            signals: Vec::new(),
        }
    }

    /// Add a consistency check
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }
}

/// Heuristic confidence scorer
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    settings: ConfidenceSettings,
}

impl ConfidenceScorer {
    /// Create a scorer with the given settings
    pub fn new(settings: ConfidenceSettings) -> Self {
        Self { settings }
    }

    /// Points for reading density: 3 when dense, 2 above the minimum, else 1
    pub fn density_points(&self, reading_count: usize) -> i32 {
        if reading_count >= self.settings.dense_reading_count {
            3
        } else if reading_count >= self.settings.min_reading_count {
            2
        } else {
            1
        }
    }

    /// Raw score before mapping to a level
    pub fn score(&self, inputs: &QualityInputs) -> i32 {
        let mut score = self.density_points(inputs.reading_count);
        score += inputs.signals.iter().map(|s| s.points()).sum::<i32>();
        if inputs.skipped > inputs.reading_count {
            score -= 1;
        }
        score
    }

    /// Map inputs to a confidence level: >= 5 High, >= 3 Medium, else Low
    pub fn assess(&self, inputs: &QualityInputs) -> Confidence {
        if inputs.reading_count == 0 {
            return Confidence::Low;
        }
        match self.score(inputs) {
            s if s >= 5 => Confidence::High,
            s if s >= 3 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    /// Distance vs. fuel used: fuel dropping while parked, or driving without
    /// using any fuel, are both suspicious.
    pub fn distance_consumption_signal(&self, distance_km: f64, consumed_liters: f64) -> Signal {
        if distance_km == 0.0 && consumed_liters > self.settings.idle_consumption_liters {
            Signal::Suspicious
        } else if distance_km > 0.0 && consumed_liters == 0.0 {
            Signal::Suspicious
        } else {
            Signal::Agree
        }
    }

    /// Refuel pattern: a day with no refuel and no consumption is a
    /// consistent inactive day; too many refuels in a day is implausible.
    pub fn refuel_pattern_signal(
        &self,
        refuel_count: usize,
        max_refuels_in_a_day: usize,
        consumed_liters: f64,
    ) -> Signal {
        if refuel_count == 0 && consumed_liters == 0.0 {
            Signal::Agree
        } else if max_refuels_in_a_day > self.settings.max_daily_refuels {
            Signal::Suspicious
        } else {
            Signal::Neutral
        }
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ConfidenceSettings::default())
    }
}

/// Agree when `value` lies in `[min, max]`, suspicious otherwise
pub fn plausibility_signal(value: f64, min: f64, max: f64) -> Signal {
    if value >= min && value <= max {
        Signal::Agree
    } else {
        Signal::Suspicious
    }
}
