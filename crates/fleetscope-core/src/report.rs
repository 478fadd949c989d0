//! Combined reports
//!
//! Joins the independent per-domain bucket maps into one row per calendar
//! label. A domain that was not requested, or failed, is `null` in every row;
//! a domain that ran but saw no data has a zeroed bucket with
//! `hasData: false`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::aggregate::{Bucket, BucketMap};
use crate::bucket::{BucketKey, Granularity};
use crate::domain::{
    BatterySummary, Domain, DrivingSummary, EngineSummary, FuelSummary, TireSummary,
};

/// One label across every domain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedReportRow {
    /// Sort key behind the label
    #[serde(skip)]
    pub key: BucketKey,
    /// Calendar label
    pub label: String,
    /// Driving bucket
    pub driving_summary: Option<Bucket<DrivingSummary>>,
    /// Fuel bucket
    pub fuel_summary: Option<Bucket<FuelSummary>>,
    /// Battery bucket
    pub battery_summary: Option<Bucket<BatterySummary>>,
    /// Engine bucket
    pub engine_summary: Option<Bucket<EngineSummary>>,
    /// Tire bucket
    pub tire_summary: Option<Bucket<TireSummary>>,
}

impl CombinedReportRow {
    /// Whether any domain saw data for this label
    pub fn has_data(&self) -> bool {
        self.driving_summary.as_ref().is_some_and(|b| b.has_data)
            || self.fuel_summary.as_ref().is_some_and(|b| b.has_data)
            || self.battery_summary.as_ref().is_some_and(|b| b.has_data)
            || self.engine_summary.as_ref().is_some_and(|b| b.has_data)
            || self.tire_summary.as_ref().is_some_and(|b| b.has_data)
    }
}

/// Per-domain report for one device and range
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedReport {
    /// Reported device
    pub device_id: String,
    /// First instant of the range
    pub start: DateTime<Utc>,
    /// Last instant of the range
    pub end: DateTime<Utc>,
    /// Bucket size
    pub granularity: Granularity,
    /// One row per label, ascending
    pub rows: Vec<CombinedReportRow>,
    /// Requested domains whose aggregation failed
    pub failed_domains: Vec<Domain>,
}

impl CombinedReport {
    /// Row for a label, if it is in range
    pub fn row(&self, label: &str) -> Option<&CombinedReportRow> {
        self.rows.iter().find(|row| row.label == label)
    }
}

/// Bucket maps of the domains that produced a result
#[derive(Debug, Clone, Default)]
pub struct DomainBuckets {
    /// Driving buckets
    pub driving: Option<BucketMap<DrivingSummary>>,
    /// Fuel buckets
    pub fuel: Option<BucketMap<FuelSummary>>,
    /// Battery buckets
    pub battery: Option<BucketMap<BatterySummary>>,
    /// Engine buckets
    pub engine: Option<BucketMap<EngineSummary>>,
    /// Tire buckets
    pub tire: Option<BucketMap<TireSummary>>,
}

impl DomainBuckets {
    fn keys(&self) -> BTreeSet<BucketKey> {
        let mut keys = BTreeSet::new();
        keys.extend(self.driving.iter().flat_map(|m| m.keys().copied()));
        keys.extend(self.fuel.iter().flat_map(|m| m.keys().copied()));
        keys.extend(self.battery.iter().flat_map(|m| m.keys().copied()));
        keys.extend(self.engine.iter().flat_map(|m| m.keys().copied()));
        keys.extend(self.tire.iter().flat_map(|m| m.keys().copied()));
        keys
    }
}

fn take<S>(map: &mut Option<BucketMap<S>>, key: &BucketKey) -> Option<Bucket<S>> {
    map.as_mut().and_then(|m| m.remove(key))
}

/// Full outer join of the domain maps.
///
/// Rows cover `keys` plus any label a domain produced, ascending by key, so
/// ISO week labels sort correctly across year boundaries.
pub fn assemble(
    device_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    keys: &[BucketKey],
    mut buckets: DomainBuckets,
    failed_domains: Vec<Domain>,
) -> CombinedReport {
    let mut all_keys = buckets.keys();
    all_keys.extend(keys.iter().copied());

    let rows = all_keys
        .into_iter()
        .map(|key| CombinedReportRow {
            key,
            label: key.label(),
            driving_summary: take(&mut buckets.driving, &key),
            fuel_summary: take(&mut buckets.fuel, &key),
            battery_summary: take(&mut buckets.battery, &key),
            engine_summary: take(&mut buckets.engine, &key),
            tire_summary: take(&mut buckets.tire, &key),
        })
        .collect();

    CombinedReport {
        device_id: device_id.to_string(),
        start,
        end,
        granularity,
        rows,
        failed_domains,
    }
}
