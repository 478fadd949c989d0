//! Fuel gauge noise filter
//!
//! Fuel senders bounce: a tank sitting at 50 % reports 53 % for one sample
//! and then 50 % again. The filter drops such single-sample spikes in one pass
//! while keeping genuine steps such as a refuel.

use chrono::{DateTime, Utc};

use crate::reading::Reading;

/// One fuel gauge sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelSample {
    /// Sample time
    pub at: DateTime<Utc>,
    /// Gauge level, 0-100 percent
    pub level: f64,
}

impl FuelSample {
    /// Fuel sample from a reading, if it carries a fuel level
    pub fn from_reading(reading: &Reading) -> Option<Self> {
        reading.fuel_level.map(|level| Self {
            at: reading.timestamp,
            level,
        })
    }
}

/// Remove single-sample jitter from one day's ordered fuel samples.
///
/// The first and last sample are always kept. An interior sample is dropped
/// when skipping it yields a smoother trend than keeping it, and the jump into
/// it was below `jitter_threshold` percent points. Neighbors are always the
/// original samples, never the filtered ones.
pub fn remove_jitter(samples: &[FuelSample], jitter_threshold: f64) -> Vec<FuelSample> {
    if samples.len() <= 2 {
        return samples.to_vec();
    }

    let mut kept = Vec::with_capacity(samples.len());
    kept.push(samples[0]);

    for window in samples.windows(3) {
        let (prev, current, next) = (window[0].level, window[1].level, window[2].level);

        let prev_diff = (current - prev).abs();
        let next_diff = (next - current).abs();
        let direct_diff = (next - prev).abs();

        let is_jitter = direct_diff < prev_diff.max(next_diff) && prev_diff < jitter_threshold;
        if !is_jitter {
            kept.push(window[1]);
        }
    }

    kept.push(samples[samples.len() - 1]);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn samples(levels: &[f64]) -> Vec<FuelSample> {
        levels
            .iter()
            .enumerate()
            .map(|(i, &level)| FuelSample {
                at: Utc.timestamp_opt(1_704_096_000 + i as i64 * 3600, 0).unwrap(),
                level,
            })
            .collect()
    }

    fn levels(samples: &[FuelSample]) -> Vec<f64> {
        samples.iter().map(|s| s.level).collect()
    }

    #[test]
    fn test_single_sample_bounce_is_removed() {
        let filtered = remove_jitter(&samples(&[50.0, 53.0, 50.0]), 5.0);
        assert_eq!(levels(&filtered), vec![50.0, 50.0]);

        let filtered = remove_jitter(&samples(&[50.0, 47.0, 50.0]), 5.0);
        assert_eq!(levels(&filtered), vec![50.0, 50.0]);
    }

    #[test]
    fn test_genuine_step_is_kept() {
        let filtered = remove_jitter(&samples(&[50.0, 50.0, 70.0, 70.0]), 5.0);
        assert_eq!(levels(&filtered), vec![50.0, 50.0, 70.0, 70.0]);
    }

    #[test]
    fn test_large_spike_is_kept() {
        // 20 points is far above the jitter threshold
        let filtered = remove_jitter(&samples(&[50.0, 70.0, 50.0]), 5.0);
        assert_eq!(levels(&filtered), vec![50.0, 70.0, 50.0]);
    }

    #[test]
    fn test_steady_drain_is_kept() {
        let filtered = remove_jitter(&samples(&[80.0, 78.0, 76.0, 74.0]), 5.0);
        assert_eq!(levels(&filtered), vec![80.0, 78.0, 76.0, 74.0]);
    }

    #[test]
    fn test_endpoints_always_kept() {
        assert_eq!(levels(&remove_jitter(&samples(&[10.0]), 5.0)), vec![10.0]);
        assert_eq!(
            levels(&remove_jitter(&samples(&[10.0, 13.0]), 5.0)),
            vec![10.0, 13.0]
        );
        assert!(remove_jitter(&[], 5.0).is_empty());
    }

    #[test]
    fn test_bounce_before_drop_is_removed() {
        // 82 is a bounce on the way down to 35
        let filtered = remove_jitter(&samples(&[80.0, 82.0, 35.0, 80.0, 60.0]), 5.0);
        assert_eq!(levels(&filtered), vec![80.0, 35.0, 80.0, 60.0]);
    }
}
