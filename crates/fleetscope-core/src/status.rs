//! Current device status
//!
//! A snapshot is the latest usable reading of each domain pushed through the
//! regular aggregator as a one-reading bucket. It has no deltas, so time and
//! distance are zero, but state rules such as low voltage still see the
//! reading.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{aggregate, Bucket};
use crate::bucket::{BucketKey, Granularity};
use crate::domain::{
    BatterySummary, Domain, DomainAnalyzer, DrivingSummary, EngineSummary, FuelSummary,
    TireSummary,
};
use crate::engine::{settle, AnalyticsEngine};
use crate::error::{AnalyticsError, RequestContext};
use crate::range::TimeRange;
use crate::source::ReadingSource;

/// Latest known state of a device, per domain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Device described
    pub device_id: String,
    /// Snapshot instant
    pub as_of: DateTime<Utc>,
    /// Latest driving state
    pub driving: Option<Bucket<DrivingSummary>>,
    /// Latest fuel state
    pub fuel: Option<Bucket<FuelSummary>>,
    /// Latest battery state
    pub battery: Option<Bucket<BatterySummary>>,
    /// Latest engine state
    pub engine: Option<Bucket<EngineSummary>>,
    /// Latest tire state
    pub tire: Option<Bucket<TireSummary>>,
    /// Domains whose lookup failed
    pub failed_domains: Vec<Domain>,
}

impl<S: ReadingSource> AnalyticsEngine<S> {
    /// Snapshot of the device as of `as_of`.
    ///
    /// Each domain uses its most recent well-formed reading within the
    /// configured lookback window; domains without one are `None`.
    pub async fn current_status(
        &self,
        device_id: &str,
        as_of: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<DeviceStatus, AnalyticsError> {
        let lookback_ms = (self.config.status_lookback_hours * 3_600_000.0) as i64;
        let start = Duration::try_milliseconds(lookback_ms)
            .and_then(|lookback| as_of.checked_sub_signed(lookback));
        let invalid = |start: String, reason: String| AnalyticsError::InvalidRange {
            device_id: device_id.to_string(),
            start,
            end: as_of.to_rfc3339(),
            reason,
        };
        let Some(start) = start else {
            return Err(invalid(
                format!("{} hours before", self.config.status_lookback_hours),
                "lookback reaches past the earliest representable instant".to_string(),
            ));
        };
        let range = TimeRange::new(start, as_of)
            .map_err(|e| invalid(start.to_rfc3339(), e.to_string()))?;
        let context = RequestContext::new(device_id, range);
        self.ensure_device(&context, cancel).await?;

        tracing::info!("Status for {} as of {}", device_id, as_of.to_rfc3339());

        let (driving, fuel, battery, engine, tire) = tokio::join!(
            self.latest_bucket(&self.driving, &context, cancel),
            self.latest_bucket(&self.fuel, &context, cancel),
            self.latest_bucket(&self.battery, &context, cancel),
            self.latest_bucket(&self.engine, &context, cancel),
            self.latest_bucket(&self.tire, &context, cancel),
        );

        let mut failed = Vec::new();
        let status = DeviceStatus {
            device_id: device_id.to_string(),
            as_of,
            driving: settle(driving, Domain::Driving, &mut failed)?,
            fuel: settle(fuel, Domain::Fuel, &mut failed)?,
            battery: settle(battery, Domain::Battery, &mut failed)?,
            engine: settle(engine, Domain::Engine, &mut failed)?,
            tire: settle(tire, Domain::Tire, &mut failed)?,
            failed_domains: failed,
        };
        Ok(status)
    }

    async fn latest_bucket<A>(
        &self,
        analyzer: &A,
        context: &RequestContext,
        cancel: &CancellationToken,
    ) -> Result<Option<Bucket<A::Summary>>, AnalyticsError>
    where
        A: DomainAnalyzer + ?Sized,
    {
        let context = context.with_domain(analyzer.domain());
        let series = self
            .fetch_series(analyzer, &context, &context.range, cancel)
            .await?
            .into_latest();

        let Some(latest) = series.readings.first() else {
            return Ok(None);
        };
        let key = BucketKey::containing(latest.timestamp, Granularity::Day);

        let mut buckets = aggregate(
            analyzer,
            &context.device_id,
            &series,
            &[key],
            &self.scorer,
            cancel,
        )
        .map_err(|_| AnalyticsError::Cancelled {
            context: context.clone(),
        })?;
        Ok(buckets.remove(&key))
    }
}
