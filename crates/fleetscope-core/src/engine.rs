//! Analytics engine
//!
//! Orchestrates one request: validates the range, checks the device, fans the
//! requested domains out concurrently and joins their bucket maps into a
//! combined report. The engine holds configuration only; every call fetches
//! and recomputes from the source.

use tokio_util::sync::CancellationToken;

use crate::aggregate::{aggregate, BucketMap};
use crate::bucket::{BucketKey, Granularity};
use crate::config::AnalyticsConfig;
use crate::confidence::ConfidenceScorer;
use crate::delta::ReadingSeries;
use crate::domain::{
    BatteryAnalyzer, BatterySummary, Domain, DomainAnalyzer, DrivingAnalyzer, DrivingSummary,
    EngineAnalyzer, EngineSummary, FuelAnalyzer, FuelSummary, TireAnalyzer, TireSummary,
};
use crate::error::{AnalyticsError, RequestContext};
use crate::range::TimeRange;
use crate::report::{assemble, CombinedReport, DomainBuckets};
use crate::source::ReadingSource;

/// What to report on
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    /// Device to report on
    pub device_id: String,
    /// Inclusive UTC range
    pub range: TimeRange,
    /// Bucket size
    pub granularity: Granularity,
    /// Domains to compute; the rest are `null` in a combined report
    pub domains: Vec<Domain>,
}

impl ReportRequest {
    /// Request covering every domain
    pub fn new(device_id: impl Into<String>, range: TimeRange, granularity: Granularity) -> Self {
        Self {
            device_id: device_id.into(),
            range,
            granularity,
            domains: Domain::ALL.to_vec(),
        }
    }

    /// Build a request from raw parameters (`YYYY-MM-DD` or RFC 3339 bounds)
    pub fn parse(
        device_id: &str,
        start: &str,
        end: &str,
        granularity: Granularity,
    ) -> Result<Self, AnalyticsError> {
        let range = TimeRange::parse(start, end).map_err(|e| AnalyticsError::InvalidRange {
            device_id: device_id.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(device_id, range, granularity))
    }

    /// Restrict the request to the given domains
    pub fn with_domains(mut self, domains: impl IntoIterator<Item = Domain>) -> Self {
        self.domains = domains.into_iter().collect();
        self
    }

    /// Whether a domain was requested
    pub fn wants(&self, domain: Domain) -> bool {
        self.domains.contains(&domain)
    }

    /// Error context for this request
    pub fn context(&self) -> RequestContext {
        RequestContext::new(&self.device_id, self.range)
    }
}

/// Telemetry analytics engine over a reading source
pub struct AnalyticsEngine<S> {
    pub(crate) source: S,
    pub(crate) config: AnalyticsConfig,
    pub(crate) scorer: ConfidenceScorer,
    pub(crate) driving: DrivingAnalyzer,
    pub(crate) fuel: FuelAnalyzer,
    pub(crate) battery: BatteryAnalyzer,
    pub(crate) engine: EngineAnalyzer,
    pub(crate) tire: TireAnalyzer,
}

impl<S: ReadingSource> AnalyticsEngine<S> {
    /// Create an engine; the configuration is validated first
    pub fn new(source: S, config: AnalyticsConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        Ok(Self {
            scorer: ConfidenceScorer::new(config.confidence.clone()),
            driving: DrivingAnalyzer::from_config(&config),
            fuel: FuelAnalyzer::from_config(&config),
            battery: BatteryAnalyzer::from_config(&config),
            engine: EngineAnalyzer::from_config(&config),
            tire: TireAnalyzer::from_config(&config),
            source,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Underlying reading source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Driving buckets for one device and range
    pub async fn driving_report(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<BucketMap<DrivingSummary>, AnalyticsError> {
        self.domain_report(&self.driving, request, cancel).await
    }

    /// Fuel buckets for one device and range
    pub async fn fuel_report(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<BucketMap<FuelSummary>, AnalyticsError> {
        self.domain_report(&self.fuel, request, cancel).await
    }

    /// Battery buckets for one device and range
    pub async fn battery_report(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<BucketMap<BatterySummary>, AnalyticsError> {
        self.domain_report(&self.battery, request, cancel).await
    }

    /// Engine buckets for one device and range
    pub async fn engine_report(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<BucketMap<EngineSummary>, AnalyticsError> {
        self.domain_report(&self.engine, request, cancel).await
    }

    /// Tire buckets for one device and range
    pub async fn tire_report(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<BucketMap<TireSummary>, AnalyticsError> {
        self.domain_report(&self.tire, request, cancel).await
    }

    /// Buckets of a single domain. Unlike a combined report, a failure of
    /// the domain is the request's error.
    pub async fn domain_report<A>(
        &self,
        analyzer: &A,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<BucketMap<A::Summary>, AnalyticsError>
    where
        A: DomainAnalyzer + ?Sized,
    {
        let keys = self.bucket_keys(request)?;
        let context = request.context();
        self.ensure_device(&context, cancel).await?;

        tracing::info!(
            "{} report for {} over {} ({} {} buckets)",
            analyzer.domain(),
            request.device_id,
            request.range,
            keys.len(),
            request.granularity
        );
        self.run_domain(analyzer, request, &keys, cancel).await
    }

    /// Report across the requested domains, one row per label.
    ///
    /// Domains run concurrently. A domain that fails after the device check
    /// is `null` in every row and listed in `failed_domains`; cancellation
    /// fails the whole request.
    pub async fn combined_report(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<CombinedReport, AnalyticsError> {
        let keys = self.bucket_keys(request)?;
        let context = request.context();
        self.ensure_device(&context, cancel).await?;

        tracing::info!(
            "Combined report for {} over {} ({} {} buckets, domains {:?})",
            request.device_id,
            request.range,
            keys.len(),
            request.granularity,
            request.domains
        );

        let (driving, fuel, battery, engine, tire) = tokio::join!(
            self.optional_domain(&self.driving, request, &keys, cancel),
            self.optional_domain(&self.fuel, request, &keys, cancel),
            self.optional_domain(&self.battery, request, &keys, cancel),
            self.optional_domain(&self.engine, request, &keys, cancel),
            self.optional_domain(&self.tire, request, &keys, cancel),
        );

        let mut failed = Vec::new();
        let buckets = DomainBuckets {
            driving: settle(driving, Domain::Driving, &mut failed)?,
            fuel: settle(fuel, Domain::Fuel, &mut failed)?,
            battery: settle(battery, Domain::Battery, &mut failed)?,
            engine: settle(engine, Domain::Engine, &mut failed)?,
            tire: settle(tire, Domain::Tire, &mut failed)?,
        };
        if cancel.is_cancelled() {
            return Err(AnalyticsError::Cancelled { context });
        }

        Ok(assemble(
            &request.device_id,
            request.range.start,
            request.range.end,
            request.granularity,
            &keys,
            buckets,
            failed,
        ))
    }

    /// Bucket keys of the request, bounded by `max_buckets`
    pub(crate) fn bucket_keys(
        &self,
        request: &ReportRequest,
    ) -> Result<Vec<BucketKey>, AnalyticsError> {
        let count = request.granularity.bucket_count(&request.range);
        if count > self.config.max_buckets {
            return Err(AnalyticsError::InvalidRange {
                device_id: request.device_id.clone(),
                start: request.range.start.to_rfc3339(),
                end: request.range.end.to_rfc3339(),
                reason: format!(
                    "{} {} buckets exceed the limit of {}",
                    count, request.granularity, self.config.max_buckets
                ),
            });
        }
        Ok(request.granularity.keys_in_range(&request.range))
    }

    /// Fail with `UnknownDevice` unless the source knows the device
    pub(crate) async fn ensure_device(
        &self,
        context: &RequestContext,
        cancel: &CancellationToken,
    ) -> Result<(), AnalyticsError> {
        let exists = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(AnalyticsError::Cancelled { context: context.clone() });
            }
            result = self.source.device_exists(&context.device_id) => {
                result.map_err(|source| AnalyticsError::UpstreamUnavailable {
                    context: context.clone(),
                    source,
                })?
            }
        };

        if exists {
            Ok(())
        } else {
            Err(AnalyticsError::UnknownDevice {
                context: context.clone(),
            })
        }
    }

    /// Fetch and prepare one domain's readings
    pub(crate) async fn fetch_series<A>(
        &self,
        analyzer: &A,
        context: &RequestContext,
        range: &TimeRange,
        cancel: &CancellationToken,
    ) -> Result<ReadingSeries, AnalyticsError>
    where
        A: DomainAnalyzer + ?Sized,
    {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(AnalyticsError::Cancelled { context: context.clone() });
            }
            result = self.source.find(&context.device_id, range, analyzer.relevant_fields()) => {
                result.map_err(|source| AnalyticsError::UpstreamUnavailable {
                    context: context.clone(),
                    source,
                })?
            }
        };

        let series = ReadingSeries::prepare(raw, range, analyzer.required_fields());
        if series.skipped() > 0 {
            tracing::warn!(
                "Skipped {} malformed {} readings ({})",
                series.skipped(),
                analyzer.domain(),
                context
            );
        }
        Ok(series)
    }

    async fn run_domain<A>(
        &self,
        analyzer: &A,
        request: &ReportRequest,
        keys: &[BucketKey],
        cancel: &CancellationToken,
    ) -> Result<BucketMap<A::Summary>, AnalyticsError>
    where
        A: DomainAnalyzer + ?Sized,
    {
        let context = request.context().with_domain(analyzer.domain());
        let series = self
            .fetch_series(analyzer, &context, &request.range, cancel)
            .await?;

        tracing::debug!(
            "{} pass for {}: {} readings into {} buckets",
            analyzer.domain(),
            request.device_id,
            series.len(),
            keys.len()
        );

        aggregate(
            analyzer,
            &request.device_id,
            &series,
            keys,
            &self.scorer,
            cancel,
        )
        .map_err(|_| AnalyticsError::Cancelled { context })
    }

    async fn optional_domain<A>(
        &self,
        analyzer: &A,
        request: &ReportRequest,
        keys: &[BucketKey],
        cancel: &CancellationToken,
    ) -> Result<Option<BucketMap<A::Summary>>, AnalyticsError>
    where
        A: DomainAnalyzer + ?Sized,
    {
        if !request.wants(analyzer.domain()) {
            return Ok(None);
        }
        self.run_domain(analyzer, request, keys, cancel)
            .await
            .map(Some)
    }
}

/// Turn a domain failure into a `null` column; cancellation stays an error
pub(crate) fn settle<T>(
    result: Result<Option<T>, AnalyticsError>,
    domain: Domain,
    failed: &mut Vec<Domain>,
) -> Result<Option<T>, AnalyticsError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_cancelled() => Err(err),
        Err(err) => {
            tracing::warn!("Domain {} failed, reporting it as null: {}", domain, err);
            failed.push(domain);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryReadingSource;

    #[test]
    fn test_parse_rejects_inverted_range() {
        let err = ReportRequest::parse("truck-1", "2024-01-07", "2024-01-01", Granularity::Day)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRange { .. }));

        let err = ReportRequest::parse("truck-1", "last tuesday", "2024-01-01", Granularity::Day)
            .unwrap_err();
        assert!(err.to_string().contains("last tuesday"));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = AnalyticsConfig::default();
        config.fuel.tank_capacity_liters = -1.0;

        let result = AnalyticsEngine::new(MemoryReadingSource::new(), config);
        assert!(matches!(result, Err(AnalyticsError::Configuration(_))));
    }

    #[test]
    fn test_bucket_limit() {
        let config = AnalyticsConfig {
            max_buckets: 31,
            ..AnalyticsConfig::default()
        };
        let engine = AnalyticsEngine::new(MemoryReadingSource::new(), config).unwrap();

        let month = ReportRequest::parse("t", "2024-01-01", "2024-01-31", Granularity::Day).unwrap();
        assert_eq!(engine.bucket_keys(&month).unwrap().len(), 31);

        let longer = ReportRequest::parse("t", "2024-01-01", "2024-02-01", Granularity::Day).unwrap();
        assert!(matches!(
            engine.bucket_keys(&longer),
            Err(AnalyticsError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_settle_keeps_cancellation() {
        let range = TimeRange::parse("2024-01-01", "2024-01-01").unwrap();
        let mut failed = Vec::new();

        let unknown: Result<Option<()>, _> = Err(AnalyticsError::UnknownDevice {
            context: RequestContext::new("t", range),
        });
        assert_eq!(settle(unknown, Domain::Fuel, &mut failed).unwrap(), None);
        assert_eq!(failed, vec![Domain::Fuel]);

        let cancelled: Result<Option<()>, _> = Err(AnalyticsError::Cancelled {
            context: RequestContext::new("t", range),
        });
        assert!(settle(cancelled, Domain::Tire, &mut failed).is_err());
        assert_eq!(failed, vec![Domain::Fuel]);
    }
}
