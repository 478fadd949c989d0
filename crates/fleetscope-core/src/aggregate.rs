//! Bucketed aggregation
//!
//! The one generic aggregator shared by every domain. It slices a prepared
//! reading series into calendar buckets, hands each slice to the domain's
//! analyzer and scores the result. Every requested bucket is emitted, with or
//! without data.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::bucket::BucketKey;
use crate::confidence::{Confidence, ConfidenceScorer, QualityInputs};
use crate::delta::ReadingSeries;
use crate::domain::{BucketWindow, Domain, DomainAnalyzer};

/// Aggregation stopped because the request was cancelled
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("aggregation cancelled")]
pub struct AggregationCancelled;

/// One (device, domain, period) result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket<S> {
    /// Calendar label (`2024-01-05`, `2024-W01`, `2024-01`)
    pub label: String,
    /// Device the bucket describes
    pub device_id: String,
    /// Domain the summary belongs to
    pub domain: Domain,
    /// Domain figures
    #[serde(flatten)]
    pub summary: S,
    /// Data quality label
    pub confidence: Confidence,
    /// Usable readings in the bucket
    pub reading_count: usize,
    /// Malformed readings dropped from the bucket
    pub skipped_count: usize,
    /// Whether any usable reading fell into the bucket
    pub has_data: bool,
}

impl<S: Default> Bucket<S> {
    /// A gap-filled bucket: zeroed summary, Low confidence, no data
    pub fn empty(key: &BucketKey, device_id: &str, domain: Domain, skipped_count: usize) -> Self {
        Self {
            label: key.label(),
            device_id: device_id.to_string(),
            domain,
            summary: S::default(),
            confidence: Confidence::Low,
            reading_count: 0,
            skipped_count,
            has_data: false,
        }
    }
}

/// Buckets of one domain, ascending by key
pub type BucketMap<S> = BTreeMap<BucketKey, Bucket<S>>;

/// Aggregate one domain over the given bucket keys.
///
/// `keys` must share one granularity. Deltas are computed once over the
/// whole series and handed to the bucket holding their FROM reading, so
/// summing any additive figure over the buckets gives the whole-range value.
/// The token is checked before every bucket.
pub fn aggregate<A>(
    analyzer: &A,
    device_id: &str,
    series: &ReadingSeries,
    keys: &[BucketKey],
    scorer: &ConfidenceScorer,
    cancel: &CancellationToken,
) -> Result<BucketMap<A::Summary>, AggregationCancelled>
where
    A: DomainAnalyzer + ?Sized,
{
    let readings = &series.readings;
    let deltas = series.deltas();
    let arrivals = series.arrivals();
    let mut buckets = BTreeMap::new();

    for key in keys {
        if cancel.is_cancelled() {
            return Err(AggregationCancelled);
        }

        let granularity = key.granularity();
        let start = readings
            .partition_point(|r| BucketKey::containing(r.timestamp, granularity) < *key);
        let end = readings
            .partition_point(|r| BucketKey::containing(r.timestamp, granularity) <= *key);
        let skipped = series
            .skipped_at
            .iter()
            .filter(|at| BucketKey::containing(**at, granularity) == *key)
            .count();

        if start == end {
            buckets.insert(
                *key,
                Bucket::empty(key, device_id, analyzer.domain(), skipped),
            );
            continue;
        }

        // Delta i starts at reading i, arrival i ends at it
        let window = BucketWindow::new(
            &readings[start..end],
            &deltas[start.min(deltas.len())..end.min(deltas.len())],
            &arrivals[start..end],
        );
        let analysis = analyzer.summarize(&window);

        let inputs = QualityInputs {
            reading_count: end - start,
            skipped,
            signals: analysis.signals,
        };
        let confidence = scorer.assess(&inputs);

        tracing::debug!(
            "{} bucket {} for {}: {} readings, {} deltas, {} skipped, {} confidence",
            analyzer.domain(),
            key,
            device_id,
            inputs.reading_count,
            window.deltas.len(),
            skipped,
            confidence
        );

        buckets.insert(
            *key,
            Bucket {
                label: key.label(),
                device_id: device_id.to_string(),
                domain: analyzer.domain(),
                summary: analysis.summary,
                confidence,
                reading_count: inputs.reading_count,
                skipped_count: skipped,
                has_data: true,
            },
        );
    }

    Ok(buckets)
}

/// Running minimum and maximum
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Extrema {
    bounds: Option<(f64, f64)>,
}

impl Extrema {
    /// Fold in one value
    pub fn push(&mut self, value: f64) {
        self.bounds = Some(match self.bounds {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }

    /// Smallest value seen
    pub fn min(&self) -> Option<f64> {
        self.bounds.map(|(min, _)| min)
    }

    /// Largest value seen
    pub fn max(&self) -> Option<f64> {
        self.bounds.map(|(_, max)| max)
    }
}

impl FromIterator<f64> for Extrema {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut extrema = Extrema::default();
        for value in iter {
            extrema.push(value);
        }
        extrema
    }
}

/// Running weighted mean; weights are usually elapsed seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedMean {
    sum: f64,
    weight: f64,
}

impl WeightedMean {
    /// Fold in a value with its weight; non-positive weights are ignored
    pub fn push(&mut self, value: f64, weight: f64) {
        if weight > 0.0 {
            self.sum += value * weight;
            self.weight += weight;
        }
    }

    /// Total weight folded in
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The mean, if anything carried weight
    pub fn value(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.sum / self.weight)
    }
}

impl FromIterator<f64> for WeightedMean {
    /// Unweighted mean of the values
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut mean = WeightedMean::default();
        for value in iter {
            mean.push(value, 1.0);
        }
        mean
    }
}
